//! End-to-end cycles against in-memory collaborators.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use spaneval_core::{
    Backend, CycleScheduler, CycleStatus, PipelineConfig, PublishStatus, WindowTracker,
};
use spaneval_judge::fakes::ScriptedJudge;
use spaneval_store::fakes::{MemoryAnalyticsSink, MemoryTraceStore};
use spaneval_store::{
    DocumentRow, DocumentSetRow, EvalName, EvalTarget, ModelTag, QaRow, SpanContext, SpanRow,
};
use tracing_test::traced_test;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn model() -> ModelTag {
    ModelTag {
        model_id: "support-bot".to_string(),
        model_version: "2024-06".to_string(),
    }
}

fn qa_row(span_id: &str, reference: Option<&str>, end: i64) -> QaRow {
    QaRow {
        span_id: span_id.to_string(),
        input: Some(format!("question for {span_id}")),
        output: Some(format!("answer for {span_id}")),
        reference: reference.map(str::to_string),
        end_time: t(end),
    }
}

fn document_set(span_id: &str, content: &str, end: i64) -> DocumentSetRow {
    DocumentSetRow {
        span_id: span_id.to_string(),
        query: Some(format!("query for {span_id}")),
        documents: vec![DocumentRow {
            position: 0,
            content: Some(content.to_string()),
            score: Some(0.8),
        }],
        end_time: t(end),
    }
}

fn span(span_id: &str, end: i64) -> SpanRow {
    SpanRow {
        context: SpanContext {
            trace_id: format!("trace-{span_id}"),
            span_id: span_id.to_string(),
        },
        parent_id: None,
        name: "query".to_string(),
        span_kind: Some("CHAIN".to_string()),
        start_time: t(end - 1),
        end_time: t(end),
        status_code: Some("OK".to_string()),
        attributes: json!({}),
    }
}

struct Harness {
    store: Arc<MemoryTraceStore>,
    sink: Arc<MemoryAnalyticsSink>,
    judge: Arc<ScriptedJudge>,
    scheduler: CycleScheduler,
}

/// Scheduler whose first window is `[T-80s, T]` for `T = t(0)`.
fn harness() -> Harness {
    let store = Arc::new(MemoryTraceStore::new());
    let sink = Arc::new(MemoryAnalyticsSink::new());
    let judge = Arc::new(ScriptedJudge::new());
    let config = PipelineConfig::new(model());
    let policy = config.window_policy().unwrap();
    let scheduler = CycleScheduler::new(&config, store.clone(), sink.clone(), judge.clone())
        .unwrap()
        .with_tracker(WindowTracker::resume_from(policy, t(-60)));
    Harness {
        store,
        sink,
        judge,
        scheduler,
    }
}

/// Three QA records (one without reference text) and two document sets.
fn seed_standard_window(store: &MemoryTraceStore) {
    store.add_qa_row(qa_row("s1", Some("ref one"), -50));
    store.add_qa_row(qa_row("s2", None, -40));
    store.add_qa_row(qa_row("s3", Some("ref three"), -30));
    store.add_document_set(document_set("r1", "doc one", -45));
    store.add_document_set(document_set("r3", "doc three", -25));
    for (id, end) in [("s1", -50), ("s2", -40), ("s3", -30), ("r1", -45), ("r3", -25)] {
        store.add_span(span(id, end));
    }
}

#[traced_test]
#[tokio::test]
async fn standard_window_scores_well_formed_records_and_mirrors_snapshot() {
    let mut h = harness();
    seed_standard_window(&h.store);

    let outcome = h.scheduler.run_cycle(t(0)).await;

    assert_eq!(outcome.window.start(), t(-80));
    assert_eq!(outcome.window.end(), t(0));
    let report = match outcome.status {
        CycleStatus::Completed(report) => report,
        other => panic!("unexpected status: {other:?}"),
    };
    assert_eq!(report.qa_records, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.documents, 2);

    assert_eq!(h.store.annotations_named(EvalName::Hallucination).len(), 2);
    assert_eq!(h.store.annotations_named(EvalName::QaCorrectness).len(), 2);
    assert_eq!(h.store.annotations_named(EvalName::Relevance).len(), 2);
    assert!(h
        .store
        .annotation(&EvalTarget::span("s2"), EvalName::Hallucination)
        .is_none());
    assert!(h
        .store
        .annotation(&EvalTarget::document("r3", 0), EvalName::Relevance)
        .is_some());
    assert_eq!(h.judge.calls(), 6);

    let batches = h.sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].model, model());
    assert_eq!(batches[0].spans.len(), 5);
    assert_eq!(batches[0].evaluations.len(), 6);

    assert!(report
        .outcomes
        .iter()
        .all(|o| o.status == PublishStatus::Succeeded));
    assert!(logs_contain("publish.primary"));
    assert!(logs_contain("publish.secondary"));
    assert!(!logs_contain("cycle.failed"));
}

#[traced_test]
#[tokio::test]
async fn empty_window_logs_nothing_to_evaluate_without_judging_or_publishing() {
    let mut h = harness();

    let outcome = h.scheduler.run_cycle(t(0)).await;

    assert!(matches!(outcome.status, CycleStatus::NothingToEvaluate));
    assert_eq!(h.judge.calls(), 0);
    assert_eq!(h.store.log_calls(), 0);
    assert!(h.sink.batches().is_empty());
    assert!(logs_contain("nothing to evaluate"));
    assert!(!logs_contain("cycle.failed"));
}

#[traced_test]
#[tokio::test]
async fn secondary_500_keeps_primary_annotations_and_next_cycle_runs() {
    let mut h = harness();
    seed_standard_window(&h.store);
    h.sink.respond_with(500, "ingest quota exceeded");

    let outcome = h.scheduler.run_cycle(t(0)).await;

    let report = match outcome.status {
        CycleStatus::Completed(report) => report,
        other => panic!("unexpected status: {other:?}"),
    };
    let primary = report.outcome(Backend::Primary).unwrap();
    let secondary = report.outcome(Backend::Secondary).unwrap();
    assert_eq!(primary.status, PublishStatus::Succeeded);
    assert_eq!(secondary.status, PublishStatus::Failed);
    assert_eq!(secondary.status_code, Some(500));
    assert_eq!(secondary.detail, "ingest quota exceeded");
    assert_eq!(h.store.annotation_count(), 6);
    assert!(logs_contain("500"));
    assert!(logs_contain("ingest quota exceeded"));

    h.sink.respond_with(200, "{}");
    h.store.add_qa_row(qa_row("s9", Some("ref nine"), 40));
    let next = h.scheduler.run_cycle(t(60)).await;

    assert_eq!(next.window.start(), t(-20));
    assert!(matches!(next.status, CycleStatus::Completed(_)));
    assert_eq!(h.store.annotation_count(), 8);
}

#[tokio::test]
async fn overlapping_windows_overwrite_instead_of_duplicating() {
    let mut h = harness();
    // Ends inside the 20s overlap shared by the first two windows.
    h.store.add_qa_row(qa_row("s1", Some("ref"), -10));

    h.scheduler.run_cycle(t(0)).await;
    h.judge
        .answer(EvalName::Hallucination, "question for s1", "hallucinated");
    h.scheduler.run_cycle(t(60)).await;

    assert_eq!(h.store.log_calls(), 2);
    assert_eq!(h.store.annotation_count(), 2);
    let current = h
        .store
        .annotation(&EvalTarget::span("s1"), EvalName::Hallucination)
        .unwrap();
    assert_eq!(current.label, "hallucinated");
    assert_eq!(current.score, 1.0);
}

#[traced_test]
#[tokio::test]
async fn primary_failure_fails_the_cycle_and_skips_the_mirror() {
    let mut h = harness();
    seed_standard_window(&h.store);
    h.store.set_fail_writes(true);

    let outcome = h.scheduler.run_cycle(t(0)).await;

    assert!(outcome.status.is_failed());
    assert!(h.sink.batches().is_empty());
    assert!(logs_contain("cycle.failed"));
    assert!(logs_contain("stage=publish"));
}

#[tokio::test]
async fn judge_failures_reduce_counts_without_failing_the_cycle() {
    let mut h = harness();
    seed_standard_window(&h.store);
    h.judge.fail_on("doc one");
    h.judge.fail_on("question for s3");

    let outcome = h.scheduler.run_cycle(t(0)).await;

    let report = match outcome.status {
        CycleStatus::Completed(report) => report,
        other => panic!("unexpected status: {other:?}"),
    };
    let scored: Vec<usize> = report.stats.iter().map(|s| s.scored).collect();
    assert_eq!(scored, vec![1, 1, 1]);
    assert!(report.stats.iter().all(|s| s.attempted <= 2));
}

#[traced_test]
#[tokio::test]
async fn all_judge_calls_failing_still_mirrors_the_window() {
    let mut h = harness();
    h.store.add_document_set(document_set("r1", "doc one", -45));
    h.store.add_span(crate::span("r1", -45));
    h.judge.fail_on("doc one");

    let outcome = h.scheduler.run_cycle(t(0)).await;

    let report = match outcome.status {
        CycleStatus::Completed(report) => report,
        other => panic!("unexpected status: {other:?}"),
    };
    let primary = report.outcome(Backend::Primary).unwrap();
    assert_eq!(primary.status, PublishStatus::Succeeded);
    assert_eq!(primary.detail, "0 results");
    assert_eq!(
        report.outcome(Backend::Secondary).unwrap().status,
        PublishStatus::Succeeded
    );
    assert_eq!(h.store.log_calls(), 0);

    let batches = h.sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].spans.len(), 1);
    assert!(batches[0].evaluations.is_empty());
    assert!(logs_contain("cycle.no_results"));
}
