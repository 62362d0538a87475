//! Derived views over raw spans.
//!
//! - `qa_with_reference`: one row per root span, reference text assembled
//!   from the documents retrieved anywhere in the same trace
//! - `retrieved_documents`: one set per retriever span
//!
//! Missing attributes are carried through as `None`; validation is the
//! fetcher's job.

use std::collections::HashMap;

use serde_json::Value;

use crate::schema::{lookup, DocumentRow, DocumentSetRow, QaRow, SpanRow};

pub const INPUT_VALUE: &str = "input.value";
pub const OUTPUT_VALUE: &str = "output.value";
pub const RETRIEVAL_DOCUMENTS: &str = "retrieval.documents";
pub const DOCUMENT_CONTENT: &str = "document.content";
pub const DOCUMENT_SCORE: &str = "document.score";

const RETRIEVER_KIND: &str = "RETRIEVER";

/// Documents listed on a span, in retrieval order.
pub fn document_rows(span: &SpanRow) -> Vec<DocumentRow> {
    span.attr(RETRIEVAL_DOCUMENTS)
        .and_then(Value::as_array)
        .map(|docs| {
            docs.iter()
                .enumerate()
                .map(|(position, doc)| DocumentRow {
                    position,
                    content: lookup(doc, DOCUMENT_CONTENT)
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    score: lookup(doc, DOCUMENT_SCORE).and_then(Value::as_f64),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn is_retriever(span: &SpanRow) -> bool {
    span.kind().as_deref() == Some(RETRIEVER_KIND)
}

/// Retrieved-document sets, one per retriever span.
pub fn retrieved_documents(spans: &[SpanRow]) -> Vec<DocumentSetRow> {
    spans
        .iter()
        .filter(|span| is_retriever(span))
        .map(|span| DocumentSetRow {
            span_id: span.span_id().to_string(),
            query: span.attr_str(INPUT_VALUE).map(str::to_string),
            documents: document_rows(span),
            end_time: span.end_time,
        })
        .collect()
}

/// Question/answer rows for root spans, with the trace's retrieved text as reference.
pub fn qa_with_reference(spans: &[SpanRow]) -> Vec<QaRow> {
    let mut retrievers: Vec<&SpanRow> = spans.iter().filter(|s| is_retriever(s)).collect();
    retrievers.sort_by_key(|s| s.start_time);

    let mut references: HashMap<&str, Vec<String>> = HashMap::new();
    for span in retrievers {
        let contents = document_rows(span).into_iter().filter_map(|d| d.content);
        references
            .entry(span.trace_id())
            .or_default()
            .extend(contents);
    }

    spans
        .iter()
        .filter(|span| span.is_root())
        .map(|span| QaRow {
            span_id: span.span_id().to_string(),
            input: span.attr_str(INPUT_VALUE).map(str::to_string),
            output: span.attr_str(OUTPUT_VALUE).map(str::to_string),
            reference: references
                .get(span.trace_id())
                .filter(|docs| !docs.is_empty())
                .map(|docs| docs.join("\n\n")),
            end_time: span.end_time,
        })
        .collect()
}
