//! SpanEval-Judge: LLM-as-judge scoring
//!
//! The pipeline treats the judge as a pure, possibly slow, possibly failing
//! function `score(record, kind) -> Verdict`. This crate provides:
//!
//! - `Judge`: the scoring trait
//! - `templates`: prompts and label rails for Hallucination, QA Correctness, Relevance
//! - `OpenAiJudge`: chat-completions implementation at temperature 0
//! - `fakes::ScriptedJudge`: deterministic judge for tests

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spaneval_store::EvalName;

mod error;
pub mod fakes;
pub mod openai;
pub mod templates;

pub use error::JudgeError;
pub use openai::{OpenAiJudge, OpenAiJudgeConfig};
pub use templates::{rails, render, Rails};

/// Result type for judge operations
pub type JudgeResult<T> = std::result::Result<T, JudgeError>;

/// Template variables for one judge call.
///
/// For QA-style evaluators `input` is the question, `output` the generated
/// answer and `reference` the reference text. For relevance `input` is the
/// query and `reference` the document content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeRecord {
    pub input: String,
    pub output: Option<String>,
    pub reference: String,
}

impl JudgeRecord {
    pub fn qa(question: &str, answer: &str, reference: &str) -> Self {
        Self {
            input: question.to_string(),
            output: Some(answer.to_string()),
            reference: reference.to_string(),
        }
    }

    pub fn document(query: &str, content: &str) -> Self {
        Self {
            input: query.to_string(),
            output: None,
            reference: content.to_string(),
        }
    }
}

/// Raw judge answer, before it is mapped onto the rails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// LLM judge used by every evaluator.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Score one record under evaluator `kind`.
    async fn score(&self, record: &JudgeRecord, kind: EvalName) -> JudgeResult<Verdict>;

    /// Model name, for logs.
    fn model_name(&self) -> &str;
}
