//! Arize analytics client
//!
//! Mirrors a window's spans and evaluations to Arize as one bulk call.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::schema::{BackendResponse, EvaluationResult, ModelTag, SpanRow};
use crate::store_traits::AnalyticsSink;
use crate::StoreResult;

/// Arize configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArizeConfig {
    /// Bulk span endpoint
    pub endpoint: String,
    pub api_key: String,
    pub space_key: String,
    pub space_id: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ArizeConfig {
    pub fn new(endpoint: &str, api_key: &str, space_key: &str) -> Self {
        ArizeConfig {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            space_key: space_key.to_string(),
            space_id: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_space_id(mut self, space_id: &str) -> Self {
        self.space_id = Some(space_id.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Arize client implementing [`AnalyticsSink`]
pub struct ArizeClient {
    config: ArizeConfig,
    http_client: reqwest::Client,
}

impl ArizeClient {
    pub fn new(config: ArizeConfig) -> StoreResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("spaneval-store/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(ArizeClient {
            config,
            http_client,
        })
    }
}

/// Evaluation as an Arize evals row (`eval.<name>.label` style columns).
pub fn evaluation_row(result: &EvaluationResult) -> Value {
    let prefix = format!("eval.{}", result.eval_name.as_str());
    let mut row = Map::new();
    row.insert(
        "context.span_id".to_string(),
        json!(result.target.span_id()),
    );
    if let Some(position) = result.target.position() {
        row.insert("document_position".to_string(), json!(position));
    }
    row.insert(format!("{prefix}.label"), json!(result.label));
    row.insert(format!("{prefix}.score"), json!(result.score));
    row.insert(format!("{prefix}.explanation"), json!(result.explanation));
    Value::Object(row)
}

/// Request body for one bulk log call.
pub fn bulk_payload(
    spans: &[SpanRow],
    evaluations: &[EvaluationResult],
    model: &ModelTag,
) -> Value {
    json!({
        "model_id": model.model_id,
        "model_version": model.model_version,
        "environment": "tracing",
        "spans": spans,
        "evaluations": evaluations.iter().map(evaluation_row).collect::<Vec<_>>(),
    })
}

#[async_trait]
impl AnalyticsSink for ArizeClient {
    async fn log_spans(
        &self,
        spans: &[SpanRow],
        evaluations: &[EvaluationResult],
        model: &ModelTag,
    ) -> StoreResult<BackendResponse> {
        let mut request = self
            .http_client
            .post(&self.config.endpoint)
            .header("authorization", &self.config.api_key)
            .header("space_key", &self.config.space_key)
            .json(&bulk_payload(spans, evaluations, model));
        if let Some(space_id) = &self.config.space_id {
            request = request.header("space_id", space_id);
        }

        let response = request.send().await?;
        let status_code = response.status().as_u16();
        let body = response.text().await?;
        debug!(status_code = status_code, spans = spans.len(), "Arize bulk log returned");

        Ok(BackendResponse { status_code, body })
    }
}
