//! Structured observability hooks for the evaluation cycle.
//!
//! Every step of a cycle emits one event with a stable `event` field so log
//! pipelines can alert on failures without parsing messages:
//!
//! - `cycle.started`, `window.computed`, `fetch.completed`
//! - `cycle.nothing_to_evaluate`, `evaluation.completed`
//! - `publish.primary`, `publish.secondary`
//! - `cycle.failed`, `cycle.finished`
//!
//! Events emitted inside [`cycle_span`] carry its `cycle_id`.

use spaneval_store::{EvalName, EvaluationWindow};
use tracing::{error, info, warn};

/// Span wrapping one cycle; the scheduler instruments the cycle future with it.
pub fn cycle_span(cycle_id: &str) -> tracing::Span {
    tracing::info_span!("spaneval.cycle", cycle_id = %cycle_id)
}

pub fn emit_cycle_started(cycle_id: &str) {
    info!(event = "cycle.started", cycle_id = %cycle_id);
}

pub fn emit_window_computed(window: &EvaluationWindow) {
    info!(
        event = "window.computed",
        start = %window.start().to_rfc3339(),
        end = %window.end().to_rfc3339(),
        duration_ms = window.duration().num_milliseconds(),
    );
}

pub fn emit_fetch_completed(qa_records: usize, document_sets: usize, skipped: usize) {
    info!(
        event = "fetch.completed",
        qa_records = qa_records,
        document_sets = document_sets,
        skipped = skipped,
    );
}

pub fn emit_nothing_to_evaluate(window: &EvaluationWindow) {
    info!(
        event = "cycle.nothing_to_evaluate",
        window = %window,
        "nothing to evaluate"
    );
}

/// Per-evaluator counts after a batch.
pub fn emit_evaluation_completed(eval_name: EvalName, scored: usize, failed: usize) {
    info!(
        event = "evaluation.completed",
        eval_name = %eval_name,
        scored = scored,
        failed = failed,
    );
}

/// A single judge call dropped from the results.
pub fn emit_judge_failed(eval_name: EvalName, target: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "evaluation.judge_failed",
        eval_name = %eval_name,
        target = %target,
        error = %error,
    );
}

pub fn emit_publish_primary(sets: usize, results: usize) {
    info!(
        event = "publish.primary",
        success = true,
        sets = sets,
        results = results,
    );
}

pub fn emit_publish_primary_failed(error: &dyn std::fmt::Display) {
    error!(
        event = "publish.primary",
        success = false,
        error = %error,
        "annotations were not written; skipping analytics mirror"
    );
}

pub fn emit_publish_secondary(status_code: u16, spans: usize, evaluations: usize) {
    info!(
        event = "publish.secondary",
        success = true,
        status_code = status_code,
        spans = spans,
        evaluations = evaluations,
    );
}

/// Non-success answer from the analytics backend.
pub fn emit_publish_secondary_rejected(status_code: u16, body: &str) {
    error!(
        event = "publish.secondary",
        success = false,
        status_code = status_code,
        body = %body,
        "analytics backend rejected the mirror"
    );
}

/// The mirror could not be attempted or never got an answer.
pub fn emit_publish_secondary_failed(error: &dyn std::fmt::Display) {
    error!(event = "publish.secondary", success = false, error = %error);
}

pub fn emit_cycle_failed(stage: &str, error: &dyn std::fmt::Display) {
    error!(event = "cycle.failed", stage = %stage, error = %error);
}

pub fn emit_cycle_finished(duration_ms: u64, status: &str) {
    info!(
        event = "cycle.finished",
        duration_ms = duration_ms,
        status = %status,
    );
}
