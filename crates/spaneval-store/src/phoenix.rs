//! Phoenix trace store client
//!
//! Reads spans and span annotations over the Phoenix REST API and writes
//! evaluation results back as LLM annotations.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::schema::{
    DocumentSetRow, EvalName, EvalTarget, EvaluationResult, EvaluationWindow, NamedResultSet,
    QaRow, SpanRow, TraceSnapshot,
};
use crate::store_traits::TraceStore;
use crate::{views, StoreResult};

/// Spans can start well before they end; query this far back from the window
/// start and filter on end time locally.
const SPAN_START_SLACK_SECS: i64 = 300;

/// Span ids per annotation lookup request.
const ANNOTATION_BATCH: usize = 100;

/// Phoenix configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoenixConfig {
    /// Base URL, e.g. `http://phoenix:6006`
    pub endpoint: String,
    /// Project name or id
    pub project: String,
    /// Optional bearer token
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Page size for span listing
    pub page_limit: usize,
}

impl Default for PhoenixConfig {
    fn default() -> Self {
        Self::new("http://phoenix:6006", "default")
    }
}

impl PhoenixConfig {
    /// Create config for a specific endpoint and project
    pub fn new(endpoint: &str, project: &str) -> Self {
        PhoenixConfig {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project: project.to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            page_limit: 1000,
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnnotationRow {
    span_id: String,
    name: String,
    #[serde(default)]
    result: Option<AnnotationResult>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AnnotationResult {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    explanation: Option<String>,
}

/// Phoenix client implementing [`TraceStore`]
pub struct PhoenixClient {
    config: PhoenixConfig,
    http_client: reqwest::Client,
}

impl PhoenixClient {
    /// Create a new Phoenix client
    pub fn new(config: PhoenixConfig) -> StoreResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("spaneval-store/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(PhoenixClient {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> StoreResult<reqwest::Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// All spans whose end time falls in `window`.
    ///
    /// Spans that fail to decode are skipped with a warning.
    pub async fn spans_in_window(&self, window: &EvaluationWindow) -> StoreResult<Vec<SpanRow>> {
        let url = self.url(&format!("/v1/projects/{}/spans", self.config.project));
        let query_start = window.start() - ChronoDuration::seconds(SPAN_START_SLACK_SECS);
        let mut cursor: Option<String> = None;
        let mut spans = Vec::new();

        loop {
            let mut query = vec![
                ("start_time", query_start.to_rfc3339()),
                ("end_time", window.end().to_rfc3339()),
                ("limit", self.config.page_limit.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let page: Page = self
                .send(self.http_client.get(&url).query(&query))
                .await?
                .json()
                .await?;

            for raw in page.data {
                match serde_json::from_value::<SpanRow>(raw) {
                    Ok(span) if window.contains(span.end_time) => spans.push(span),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Skipping undecodable span"),
                }
            }

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(count = spans.len(), window = %window, "Fetched spans");
        Ok(spans)
    }

    /// Current annotations for the given spans that belong to known evaluations.
    pub async fn span_annotations(
        &self,
        span_ids: &[String],
    ) -> StoreResult<Vec<EvaluationResult>> {
        let url = self.url(&format!(
            "/v1/projects/{}/span_annotations",
            self.config.project
        ));
        let mut evaluations = Vec::new();

        for batch in span_ids.chunks(ANNOTATION_BATCH) {
            let mut cursor: Option<String> = None;
            loop {
                let mut query: Vec<(&str, String)> =
                    batch.iter().map(|id| ("span_ids", id.clone())).collect();
                query.push(("limit", self.config.page_limit.to_string()));
                if let Some(c) = &cursor {
                    query.push(("cursor", c.clone()));
                }

                let page: Page = self
                    .send(self.http_client.get(&url).query(&query))
                    .await?
                    .json()
                    .await?;

                for raw in page.data {
                    match serde_json::from_value::<AnnotationRow>(raw) {
                        Ok(row) => {
                            if let Some(result) = annotation_to_result(row) {
                                evaluations.push(result);
                            }
                        }
                        Err(e) => warn!(error = %e, "Skipping undecodable annotation"),
                    }
                }

                match page.next_cursor {
                    Some(next) if !next.is_empty() => cursor = Some(next),
                    _ => break,
                }
            }
        }

        Ok(evaluations)
    }

    async fn post_annotations(&self, path: &str, data: Vec<Value>) -> StoreResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let count = data.len();
        self.send(
            self.http_client
                .post(self.url(path))
                .query(&[("sync", "true")])
                .json(&json!({ "data": data })),
        )
        .await?;
        debug!(path = path, count = count, "Posted annotations");
        Ok(())
    }
}

fn annotation_to_result(row: AnnotationRow) -> Option<EvaluationResult> {
    let eval_name = EvalName::from_wire(&row.name)?;
    let result = row.result.unwrap_or_default();
    Some(EvaluationResult {
        target: EvalTarget::span(row.span_id),
        eval_name,
        label: result.label.unwrap_or_default(),
        score: result.score.unwrap_or_default(),
        explanation: result.explanation,
    })
}

/// Wire form of one annotation write.
pub fn annotation_payload(result: &EvaluationResult) -> Value {
    let mut payload = json!({
        "span_id": result.target.span_id(),
        "name": result.eval_name.as_str(),
        "annotator_kind": "LLM",
        "result": {
            "label": result.label,
            "score": result.score,
            "explanation": result.explanation,
        },
    });
    if let Some(position) = result.target.position() {
        payload["document_position"] = json!(position);
    }
    payload
}

#[async_trait]
impl TraceStore for PhoenixClient {
    async fn qa_with_reference(&self, window: &EvaluationWindow) -> StoreResult<Vec<QaRow>> {
        let spans = self.spans_in_window(window).await?;
        Ok(views::qa_with_reference(&spans))
    }

    async fn retrieved_documents(
        &self,
        window: &EvaluationWindow,
    ) -> StoreResult<Vec<DocumentSetRow>> {
        let spans = self.spans_in_window(window).await?;
        Ok(views::retrieved_documents(&spans))
    }

    async fn evaluation_views(
        &self,
        window: &EvaluationWindow,
    ) -> StoreResult<(Vec<QaRow>, Vec<DocumentSetRow>)> {
        let spans = self.spans_in_window(window).await?;
        Ok((
            views::qa_with_reference(&spans),
            views::retrieved_documents(&spans),
        ))
    }

    async fn log_evaluations(&self, sets: &[NamedResultSet]) -> StoreResult<()> {
        let (documents, spans): (Vec<&EvaluationResult>, Vec<&EvaluationResult>) = sets
            .iter()
            .flat_map(|set| set.results.iter())
            .partition(|r| r.target.position().is_some());

        self.post_annotations(
            "/v1/span_annotations",
            spans.into_iter().map(annotation_payload).collect(),
        )
        .await?;
        self.post_annotations(
            "/v1/document_annotations",
            documents.into_iter().map(annotation_payload).collect(),
        )
        .await
    }

    async fn trace_snapshot(&self, window: &EvaluationWindow) -> StoreResult<TraceSnapshot> {
        let spans = self.spans_in_window(window).await?;
        let span_ids: Vec<String> = spans.iter().map(|s| s.span_id().to_string()).collect();
        let evaluations = self.span_annotations(&span_ids).await?;
        Ok(TraceSnapshot { spans, evaluations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_trims_trailing_slash() {
        let config = PhoenixConfig::new("http://phoenix:6006/", "rag");
        assert_eq!(config.endpoint, "http://phoenix:6006");
        assert_eq!(config.project, "rag");
        assert_eq!(config.with_page_limit(0).page_limit, 1);
        assert_eq!(PhoenixConfig::default().endpoint, "http://phoenix:6006");
    }

    #[test]
    fn document_payload_carries_position() {
        let result = EvaluationResult {
            target: EvalTarget::document("s1", 2),
            eval_name: EvalName::Relevance,
            label: "relevant".into(),
            score: 1.0,
            explanation: Some("matches".into()),
        };
        let payload = annotation_payload(&result);
        assert_eq!(payload["span_id"], "s1");
        assert_eq!(payload["document_position"], 2);
        assert_eq!(payload["name"], "Relevance");
        assert_eq!(payload["result"]["label"], "relevant");
    }

    #[test]
    fn span_payload_has_no_position() {
        let result = EvaluationResult {
            target: EvalTarget::span("s1"),
            eval_name: EvalName::QaCorrectness,
            label: "correct".into(),
            score: 1.0,
            explanation: None,
        };
        let payload = annotation_payload(&result);
        assert!(payload.get("document_position").is_none());
        assert_eq!(payload["name"], "QA Correctness");
        assert_eq!(payload["annotator_kind"], "LLM");
    }

    #[test]
    fn unknown_annotation_names_are_dropped() {
        let row = AnnotationRow {
            span_id: "s1".into(),
            name: "user_feedback".into(),
            result: None,
        };
        assert!(annotation_to_result(row).is_none());
    }
}
