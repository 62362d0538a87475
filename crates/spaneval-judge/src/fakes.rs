//! Deterministic judge for tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use spaneval_store::EvalName;

use crate::error::JudgeError;
use crate::{Judge, JudgeRecord, JudgeResult, Verdict};

/// Judge that answers from a script.
///
/// By default every record is scored with the "good" label of its evaluator
/// (`factual`, `correct`, `relevant`). Individual records can be made to fail
/// or to return a specific label.
#[derive(Debug, Default)]
pub struct ScriptedJudge {
    failing: Mutex<HashSet<String>>,
    labels: Mutex<HashMap<(EvalName, String), String>>,
    calls: AtomicUsize,
}

impl ScriptedJudge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any call whose input, output or reference equals `text`.
    pub fn fail_on(&self, text: &str) {
        self.failing.lock().unwrap().insert(text.to_string());
    }

    /// Answer `label` for records of `kind` whose input is `input`.
    pub fn answer(&self, kind: EvalName, input: &str, label: &str) {
        self.labels
            .lock()
            .unwrap()
            .insert((kind, input.to_string()), label.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn default_label(kind: EvalName) -> &'static str {
        match kind {
            EvalName::Hallucination => "factual",
            EvalName::QaCorrectness => "correct",
            EvalName::Relevance => "relevant",
        }
    }
}

#[async_trait]
impl Judge for ScriptedJudge {
    async fn score(&self, record: &JudgeRecord, kind: EvalName) -> JudgeResult<Verdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self.failing.lock().unwrap().iter().any(|text| {
            record.input == *text
                || record.reference == *text
                || record.output.as_deref() == Some(text.as_str())
        });
        if failing {
            return Err(JudgeError::Unavailable("scripted failure".to_string()));
        }

        let label = self
            .labels
            .lock()
            .unwrap()
            .get(&(kind, record.input.clone()))
            .cloned()
            .unwrap_or_else(|| Self::default_label(kind).to_string());

        Ok(Verdict {
            explanation: Some(format!("scripted {label}")),
            label,
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fail_on_matches_whole_fields_only() {
        let judge = ScriptedJudge::new();
        judge.fail_on("doc one");

        let exact = JudgeRecord::qa("q", "a", "doc one");
        let partial = JudgeRecord::qa("q", "a", "doc one, revised");

        assert!(judge.score(&exact, EvalName::Hallucination).await.is_err());
        assert!(judge.score(&partial, EvalName::Hallucination).await.is_ok());
        assert_eq!(judge.calls(), 2);
    }
}
