//! Collaborator trait definitions for SpanEval
//!
//! These traits define the two external services the evaluation loop talks to:
//! - `TraceStore`: primary store of spans and evaluation annotations
//! - `AnalyticsSink`: secondary analytics backend receiving bulk span mirrors
//!
//! Both are async and backend-agnostic. In-memory fakes are provided for
//! testing via the `fakes` module; HTTP implementations live in `phoenix`
//! and `arize`.

use async_trait::async_trait;

use crate::schema::{
    BackendResponse, DocumentSetRow, EvaluationResult, EvaluationWindow, ModelTag,
    NamedResultSet, QaRow, SpanRow, TraceSnapshot,
};
use crate::StoreResult;

/// Primary trace store.
///
/// Guarantees:
/// - Reads are side-effect free and bounded by the given window.
/// - An empty window yields empty collections, never an error.
/// - `log_evaluations` upserts on `(target, eval_name)`: writing the same
///   pair twice leaves exactly one current value.
#[async_trait]
pub trait TraceStore: Send + Sync {
    /// Question/answer rows (with reference text) for root spans ending in `window`.
    async fn qa_with_reference(&self, window: &EvaluationWindow) -> StoreResult<Vec<QaRow>>;

    /// Retrieved-document sets for retriever spans ending in `window`.
    async fn retrieved_documents(
        &self,
        window: &EvaluationWindow,
    ) -> StoreResult<Vec<DocumentSetRow>>;

    /// Both evaluation views for `window`.
    ///
    /// Stores that derive the views from one span scan override this so a
    /// cycle reads the window once.
    async fn evaluation_views(
        &self,
        window: &EvaluationWindow,
    ) -> StoreResult<(Vec<QaRow>, Vec<DocumentSetRow>)> {
        let qa_rows = self.qa_with_reference(window).await?;
        let document_rows = self.retrieved_documents(window).await?;
        Ok((qa_rows, document_rows))
    }

    /// Write named result sets as evaluation annotations.
    async fn log_evaluations(&self, sets: &[NamedResultSet]) -> StoreResult<()>;

    /// Spans ending in `window` together with their current evaluations.
    async fn trace_snapshot(&self, window: &EvaluationWindow) -> StoreResult<TraceSnapshot>;
}

/// Secondary analytics backend.
///
/// Transport failures are `Err`; any HTTP answer, successful or not, is
/// returned as a [`BackendResponse`] for the caller to inspect.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn log_spans(
        &self,
        spans: &[SpanRow],
        evaluations: &[EvaluationResult],
        model: &ModelTag,
    ) -> StoreResult<BackendResponse>;
}
