//! Evaluation runner
//!
//! Fans fetched records out to the judge, a bounded number of calls at a
//! time per evaluator, and maps each verdict onto its evaluator's rails.
//! A failed or off-rails judgement drops that record only.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use spaneval_judge::{rails, Judge, JudgeRecord, JudgeResult};
use spaneval_store::{EvalName, EvalTarget, EvaluationResult, NamedResultSet};

use crate::fetcher::FetchResult;
use crate::metrics::METRICS;
use crate::obs;

/// Counts for one evaluator over one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvaluatorStats {
    pub eval_name: EvalName,
    pub attempted: usize,
    pub scored: usize,
    pub failed: usize,
}

/// Results of all three evaluators for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationBatch {
    pub hallucination: NamedResultSet,
    pub qa_correctness: NamedResultSet,
    pub relevance: NamedResultSet,
    pub stats: [EvaluatorStats; 3],
}

impl EvaluationBatch {
    pub fn sets(&self) -> [&NamedResultSet; 3] {
        [&self.hallucination, &self.qa_correctness, &self.relevance]
    }

    pub fn total_results(&self) -> usize {
        self.sets().iter().map(|s| s.len()).sum()
    }

    /// Every judge call failed (or there was nothing scorable).
    pub fn is_empty(&self) -> bool {
        self.total_results() == 0
    }

    pub fn stats_for(&self, eval_name: EvalName) -> Option<&EvaluatorStats> {
        self.stats.iter().find(|s| s.eval_name == eval_name)
    }
}

/// What the runner did with a fetch result.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No QA records and no document sets; the judge was not called.
    NothingToEvaluate,
    Evaluated(EvaluationBatch),
}

pub struct EvaluationRunner {
    judge: Arc<dyn Judge>,
    concurrency: usize,
}

impl EvaluationRunner {
    pub fn new(judge: Arc<dyn Judge>, concurrency: usize) -> Self {
        Self {
            judge,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run Hallucination and QA Correctness over the QA records and
    /// Relevance over every retrieved document.
    pub async fn run(&self, fetched: &FetchResult) -> RunOutcome {
        if fetched.is_empty() {
            return RunOutcome::NothingToEvaluate;
        }

        let qa_items: Vec<(EvalTarget, JudgeRecord)> = fetched
            .qa_records
            .iter()
            .map(|r| {
                (
                    EvalTarget::span(r.span_id.clone()),
                    JudgeRecord::qa(&r.question, &r.answer, &r.reference),
                )
            })
            .collect();

        let document_items: Vec<(EvalTarget, JudgeRecord)> = fetched
            .document_sets
            .iter()
            .flat_map(|set| {
                set.documents.iter().map(move |doc| {
                    (
                        EvalTarget::document(set.span_id.clone(), doc.position),
                        JudgeRecord::document(&set.query, &doc.content),
                    )
                })
            })
            .collect();

        let (hallucination, qa_correctness, relevance) = futures::join!(
            self.evaluate(EvalName::Hallucination, &qa_items),
            self.evaluate(EvalName::QaCorrectness, &qa_items),
            self.evaluate(EvalName::Relevance, &document_items),
        );

        RunOutcome::Evaluated(EvaluationBatch {
            stats: [hallucination.1, qa_correctness.1, relevance.1],
            hallucination: hallucination.0,
            qa_correctness: qa_correctness.0,
            relevance: relevance.0,
        })
    }

    async fn evaluate(
        &self,
        kind: EvalName,
        items: &[(EvalTarget, JudgeRecord)],
    ) -> (NamedResultSet, EvaluatorStats) {
        let judge = self.judge.as_ref();
        let rails = rails(kind);

        let outcomes: Vec<(&EvalTarget, JudgeResult<EvaluationResult>)> = stream::iter(items)
            .map(|(target, record)| async move {
                let scored = judge.score(record, kind).await.and_then(|verdict| {
                    let (label, score) = rails.classify(&verdict.label)?;
                    Ok(EvaluationResult {
                        target: target.clone(),
                        eval_name: kind,
                        label: label.to_string(),
                        score,
                        explanation: verdict.explanation,
                    })
                });
                (target, scored)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut failed = 0;
        for (target, outcome) in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    failed += 1;
                    obs::emit_judge_failed(kind, &target.to_string(), &e);
                }
            }
        }
        results.sort_by(|a, b| a.target.cmp(&b.target));

        let stats = EvaluatorStats {
            eval_name: kind,
            attempted: items.len(),
            scored: results.len(),
            failed,
        };
        METRICS.add_records_scored(stats.scored as u64);
        METRICS.add_judge_failures(stats.failed as u64);
        if stats.attempted > 0 {
            obs::emit_evaluation_completed(kind, stats.scored, stats.failed);
        }

        (NamedResultSet::new(kind, results), stats)
    }
}
