//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `MemoryTraceStore` and `MemoryAnalyticsSink` that satisfy the
//! trait contracts without any external services, plus switches to inject
//! failures at each operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::schema::*;
use crate::store_traits::*;
use crate::StoreResult;

// ---------------------------------------------------------------------------
// MemoryTraceStore
// ---------------------------------------------------------------------------

/// In-memory trace store.
///
/// Annotations are kept in a `HashMap<(target, eval_name), result>`, so
/// re-logging a pair overwrites the previous value.
#[derive(Debug, Default)]
pub struct MemoryTraceStore {
    qa_rows: Mutex<Vec<QaRow>>,
    document_sets: Mutex<Vec<DocumentSetRow>>,
    spans: Mutex<Vec<SpanRow>>,
    annotations: Mutex<HashMap<(EvalTarget, EvalName), EvaluationResult>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_snapshots: AtomicBool,
    read_calls: AtomicUsize,
    log_calls: AtomicUsize,
}

impl MemoryTraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_qa_row(&self, row: QaRow) {
        self.qa_rows.lock().unwrap().push(row);
    }

    pub fn add_document_set(&self, set: DocumentSetRow) {
        self.document_sets.lock().unwrap().push(set);
    }

    pub fn add_span(&self, span: SpanRow) {
        self.spans.lock().unwrap().push(span);
    }

    /// Make `qa_with_reference` / `retrieved_documents` fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make `log_evaluations` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `trace_snapshot` fail.
    pub fn set_fail_snapshots(&self, fail: bool) {
        self.fail_snapshots.store(fail, Ordering::SeqCst);
    }

    /// Number of read calls served (including failed ones).
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// Number of `log_evaluations` calls served (including failed ones).
    pub fn log_calls(&self) -> usize {
        self.log_calls.load(Ordering::SeqCst)
    }

    /// Current value for a `(target, eval_name)` pair.
    pub fn annotation(&self, target: &EvalTarget, eval_name: EvalName) -> Option<EvaluationResult> {
        self.annotations
            .lock()
            .unwrap()
            .get(&(target.clone(), eval_name))
            .cloned()
    }

    /// All current annotations for one evaluation name.
    pub fn annotations_named(&self, eval_name: EvalName) -> Vec<EvaluationResult> {
        self.annotations
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.eval_name == eval_name)
            .cloned()
            .collect()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.lock().unwrap().len()
    }

    fn check_read(&self) -> StoreResult<()> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("trace store unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TraceStore for MemoryTraceStore {
    async fn qa_with_reference(&self, window: &EvaluationWindow) -> StoreResult<Vec<QaRow>> {
        self.check_read()?;
        let rows = self.qa_rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|r| window.contains(r.end_time))
            .cloned()
            .collect())
    }

    async fn retrieved_documents(
        &self,
        window: &EvaluationWindow,
    ) -> StoreResult<Vec<DocumentSetRow>> {
        self.check_read()?;
        let sets = self.document_sets.lock().unwrap();
        Ok(sets
            .iter()
            .filter(|s| window.contains(s.end_time))
            .cloned()
            .collect())
    }

    async fn log_evaluations(&self, sets: &[NamedResultSet]) -> StoreResult<()> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                status: 503,
                body: "annotations rejected".to_string(),
            });
        }
        let mut annotations = self.annotations.lock().unwrap();
        for result in sets.iter().flat_map(|s| s.results.iter()) {
            annotations.insert(result.key(), result.clone());
        }
        Ok(())
    }

    async fn trace_snapshot(&self, window: &EvaluationWindow) -> StoreResult<TraceSnapshot> {
        if self.fail_snapshots.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("snapshot unavailable".to_string()));
        }
        let spans: Vec<SpanRow> = self
            .spans
            .lock()
            .unwrap()
            .iter()
            .filter(|s| window.contains(s.end_time))
            .cloned()
            .collect();
        let mut evaluations: Vec<EvaluationResult> =
            self.annotations.lock().unwrap().values().cloned().collect();
        if !spans.is_empty() {
            evaluations.retain(|r| spans.iter().any(|s| s.span_id() == r.target.span_id()));
        }
        Ok(TraceSnapshot { spans, evaluations })
    }
}

// ---------------------------------------------------------------------------
// MemoryAnalyticsSink
// ---------------------------------------------------------------------------

/// One captured `log_spans` call.
#[derive(Debug, Clone)]
pub struct LoggedBatch {
    pub spans: Vec<SpanRow>,
    pub evaluations: Vec<EvaluationResult>,
    pub model: ModelTag,
}

/// In-memory analytics sink that records calls and answers with a
/// configurable response.
#[derive(Debug)]
pub struct MemoryAnalyticsSink {
    batches: Mutex<Vec<LoggedBatch>>,
    response: Mutex<BackendResponse>,
    fail_transport: AtomicBool,
}

impl Default for MemoryAnalyticsSink {
    fn default() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            response: Mutex::new(BackendResponse {
                status_code: 200,
                body: "{}".to_string(),
            }),
            fail_transport: AtomicBool::new(false),
        }
    }
}

impl MemoryAnalyticsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every subsequent call with `status_code` and `body`.
    pub fn respond_with(&self, status_code: u16, body: &str) {
        *self.response.lock().unwrap() = BackendResponse {
            status_code,
            body: body.to_string(),
        };
    }

    /// Fail every subsequent call before any response is produced.
    pub fn set_fail_transport(&self, fail: bool) {
        self.fail_transport.store(fail, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<LoggedBatch> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalyticsSink for MemoryAnalyticsSink {
    async fn log_spans(
        &self,
        spans: &[SpanRow],
        evaluations: &[EvaluationResult],
        model: &ModelTag,
    ) -> StoreResult<BackendResponse> {
        if self.fail_transport.load(Ordering::SeqCst) {
            return Err(StoreError::Http("connection reset".to_string()));
        }
        self.batches.lock().unwrap().push(LoggedBatch {
            spans: spans.to_vec(),
            evaluations: evaluations.to_vec(),
            model: model.clone(),
        });
        Ok(self.response.lock().unwrap().clone())
    }
}
