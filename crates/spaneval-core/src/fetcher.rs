//! Trace fetcher
//!
//! Reads the question/answer and retrieved-document views for a window and
//! validates them record by record. A malformed row is skipped and counted;
//! only a failing store call fails the fetch.

use std::sync::Arc;

use serde::Serialize;
use spaneval_store::{DocumentSetRow, EvaluationWindow, QaRow, StoreError, TraceStore};
use tracing::debug;

/// A root span with everything the QA evaluators need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaRecord {
    pub span_id: String,
    pub question: String,
    pub answer: String,
    pub reference: String,
}

/// One retrieved document with usable content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    /// Position in the retriever's output, as stored
    pub position: usize,
    pub content: String,
}

/// Documents retrieved by one span, with the query that retrieved them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocumentSet {
    pub span_id: String,
    pub query: String,
    pub documents: Vec<RetrievedDocument>,
}

/// Validated records for one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchResult {
    pub qa_records: Vec<QaRecord>,
    pub document_sets: Vec<RetrievedDocumentSet>,
    /// QA rows dropped for missing fields
    pub skipped_qa_rows: usize,
    /// Documents (or whole sets without a query) dropped for missing fields
    pub skipped_documents: usize,
}

impl FetchResult {
    /// No QA records and no document sets: nothing to evaluate.
    pub fn is_empty(&self) -> bool {
        self.qa_records.is_empty() && self.document_sets.is_empty()
    }

    /// Total documents across all sets.
    pub fn document_count(&self) -> usize {
        self.document_sets.iter().map(|s| s.documents.len()).sum()
    }

    pub fn skipped(&self) -> usize {
        self.skipped_qa_rows + self.skipped_documents
    }
}

/// Read-only access to the trace store for one window at a time.
#[derive(Clone)]
pub struct TraceFetcher {
    store: Arc<dyn TraceStore>,
}

impl TraceFetcher {
    pub fn new(store: Arc<dyn TraceStore>) -> Self {
        Self { store }
    }

    pub async fn fetch(&self, window: &EvaluationWindow) -> Result<FetchResult, StoreError> {
        let (qa_rows, document_rows) = self.store.evaluation_views(window).await?;

        let mut result = FetchResult::default();

        for row in qa_rows {
            match qa_record(row) {
                Some(record) => result.qa_records.push(record),
                None => result.skipped_qa_rows += 1,
            }
        }

        for row in document_rows {
            let (set, skipped) = document_set(row);
            result.skipped_documents += skipped;
            if let Some(set) = set {
                result.document_sets.push(set);
            }
        }

        Ok(result)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn qa_record(row: QaRow) -> Option<QaRecord> {
    match (
        non_blank(row.input),
        non_blank(row.output),
        non_blank(row.reference),
    ) {
        (Some(question), Some(answer), Some(reference)) if !row.span_id.is_empty() => {
            Some(QaRecord {
                span_id: row.span_id,
                question,
                answer,
                reference,
            })
        }
        _ => {
            debug!(span_id = %row.span_id, "Skipping QA row with missing fields");
            None
        }
    }
}

/// Validate one set, returning it (if usable) and the number of documents dropped.
fn document_set(row: DocumentSetRow) -> (Option<RetrievedDocumentSet>, usize) {
    let total = row.documents.len();
    let query = match non_blank(row.query) {
        Some(query) if !row.span_id.is_empty() => query,
        _ => {
            debug!(span_id = %row.span_id, "Skipping document set without query");
            return (None, total);
        }
    };

    let documents: Vec<RetrievedDocument> = row
        .documents
        .into_iter()
        .filter_map(|doc| {
            non_blank(doc.content).map(|content| RetrievedDocument {
                position: doc.position,
                content,
            })
        })
        .collect();
    let skipped = total - documents.len();

    if documents.is_empty() {
        return (None, skipped);
    }
    (
        Some(RetrievedDocumentSet {
            span_id: row.span_id,
            query,
            documents,
        }),
        skipped,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use spaneval_store::fakes::MemoryTraceStore;
    use spaneval_store::DocumentRow;

    fn at(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn window() -> EvaluationWindow {
        EvaluationWindow::new(at(0), at(80)).unwrap()
    }

    fn qa(span_id: &str, reference: Option<&str>) -> QaRow {
        QaRow {
            span_id: span_id.to_string(),
            input: Some("What is Rust?".to_string()),
            output: Some("A systems language.".to_string()),
            reference: reference.map(str::to_string),
            end_time: at(10),
        }
    }

    fn doc(position: usize, content: Option<&str>) -> DocumentRow {
        DocumentRow {
            position,
            content: content.map(str::to_string),
            score: None,
        }
    }

    #[tokio::test]
    async fn empty_store_is_not_an_error() {
        let fetcher = TraceFetcher::new(Arc::new(MemoryTraceStore::new()));
        let result = fetcher.fetch(&window()).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.skipped(), 0);
    }

    #[tokio::test]
    async fn qa_rows_with_missing_fields_are_skipped() {
        let store = MemoryTraceStore::new();
        store.add_qa_row(qa("s1", Some("Rust is a language.")));
        store.add_qa_row(qa("s2", None));
        store.add_qa_row(qa("s3", Some("   ")));

        let result = TraceFetcher::new(Arc::new(store))
            .fetch(&window())
            .await
            .unwrap();

        assert_eq!(result.qa_records.len(), 1);
        assert_eq!(result.qa_records[0].span_id, "s1");
        assert_eq!(result.skipped_qa_rows, 2);
    }

    #[tokio::test]
    async fn documents_without_content_are_dropped_and_positions_kept() {
        let store = MemoryTraceStore::new();
        store.add_document_set(DocumentSetRow {
            span_id: "r1".to_string(),
            query: Some("rust ownership".to_string()),
            documents: vec![doc(0, Some("borrowing")), doc(1, None), doc(2, Some("moves"))],
            end_time: at(5),
        });
        store.add_document_set(DocumentSetRow {
            span_id: "r2".to_string(),
            query: None,
            documents: vec![doc(0, Some("orphan"))],
            end_time: at(5),
        });

        let result = TraceFetcher::new(Arc::new(store))
            .fetch(&window())
            .await
            .unwrap();

        assert_eq!(result.document_sets.len(), 1);
        let positions: Vec<usize> = result.document_sets[0]
            .documents
            .iter()
            .map(|d| d.position)
            .collect();
        assert_eq!(positions, vec![0, 2]);
        assert_eq!(result.skipped_documents, 2);
        assert_eq!(result.document_count(), 2);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = MemoryTraceStore::new();
        store.set_fail_reads(true);
        let err = TraceFetcher::new(Arc::new(store))
            .fetch(&window())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
