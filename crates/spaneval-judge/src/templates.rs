//! Prompt templates and label rails for the three evaluators.
//!
//! Every template fills `{input}`, `{output}` and `{reference}` and asks for
//! a JSON object `{"label": .., "explanation": ..}`. The rails define the
//! accepted labels and the score each one maps to.

use spaneval_store::EvalName;

use crate::error::JudgeError;
use crate::{JudgeRecord, JudgeResult};

/// Accepted labels for one evaluator, each paired with its score.
#[derive(Debug, Clone, Copy)]
pub struct Rails {
    labels: &'static [(&'static str, f64)],
}

impl Rails {
    pub fn labels(&self) -> Vec<&'static str> {
        self.labels.iter().map(|(label, _)| *label).collect()
    }

    /// Map a raw judge label onto the rails, returning the canonical label and score.
    pub fn classify(&self, raw: &str) -> JudgeResult<(&'static str, f64)> {
        let normalized = normalize_label(raw);
        self.labels
            .iter()
            .find(|(label, _)| *label == normalized)
            .map(|(label, score)| (*label, *score))
            .ok_or_else(|| JudgeError::UnknownLabel {
                label: raw.to_string(),
                rails: self.labels().iter().map(|l| l.to_string()).collect(),
            })
    }
}

fn normalize_label(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c.is_whitespace())
        .to_ascii_lowercase()
}

const HALLUCINATION_RAILS: Rails = Rails {
    labels: &[("hallucinated", 1.0), ("factual", 0.0)],
};

const QA_RAILS: Rails = Rails {
    labels: &[("correct", 1.0), ("incorrect", 0.0)],
};

const RELEVANCE_RAILS: Rails = Rails {
    labels: &[("relevant", 1.0), ("unrelated", 0.0)],
};

pub fn rails(kind: EvalName) -> Rails {
    match kind {
        EvalName::Hallucination => HALLUCINATION_RAILS,
        EvalName::QaCorrectness => QA_RAILS,
        EvalName::Relevance => RELEVANCE_RAILS,
    }
}

const HALLUCINATION_TEMPLATE: &str = r#"You are checking if an answer is backed by the reference.

[BEGIN DATA]
************
[Question]: {input}
************
[Reference text]: {reference}
************
[Answer]: {output}
************
[END DATA]

An answer is "factual" when every claim it makes can be found in, or directly
inferred from, the reference text. It is "hallucinated" when it asserts
information that the reference text does not contain or contradicts.

Respond in JSON format:
{
  "explanation": "step-by-step reasoning for your verdict",
  "label": "factual" | "hallucinated"
}"#;

const QA_TEMPLATE: &str = r#"You are grading whether an answer correctly answers a question,
using the reference text as ground truth.

[BEGIN DATA]
************
[Question]: {input}
************
[Reference]: {reference}
************
[Answer]: {output}
************
[END DATA]

The answer is "correct" when it answers the question accurately according to
the reference. It is "incorrect" when it is wrong, incomplete in a way that
changes the meaning, or does not address the question.

Respond in JSON format:
{
  "explanation": "step-by-step reasoning for your verdict",
  "label": "correct" | "incorrect"
}"#;

const RELEVANCE_TEMPLATE: &str = r#"You are judging whether a retrieved document fits a query.

[BEGIN DATA]
************
[Query]: {input}
************
[Reference text]: {reference}
************
[END DATA]

The document is "relevant" when it contains information that helps answer
the query. Otherwise it is "unrelated".

Respond in JSON format:
{
  "explanation": "step-by-step reasoning for your verdict",
  "label": "relevant" | "unrelated"
}"#;

pub fn template(kind: EvalName) -> &'static str {
    match kind {
        EvalName::Hallucination => HALLUCINATION_TEMPLATE,
        EvalName::QaCorrectness => QA_TEMPLATE,
        EvalName::Relevance => RELEVANCE_TEMPLATE,
    }
}

/// Render the prompt for `record` under evaluator `kind`.
pub fn render(kind: EvalName, record: &JudgeRecord) -> String {
    template(kind)
        .replace("{input}", &record.input)
        .replace("{reference}", &record.reference)
        .replace("{output}", record.output.as_deref().unwrap_or(""))
}
