//! OpenAI chat-completions judge

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spaneval_store::EvalName;
use tracing::debug;

use crate::error::JudgeError;
use crate::templates::render;
use crate::{Judge, JudgeRecord, JudgeResult, Verdict};

const SYSTEM_PROMPT: &str = "You are an expert evaluator. Respond only with valid JSON.";

/// OpenAI judge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiJudgeConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl OpenAiJudgeConfig {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: "gpt-4-turbo-preview".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Judge backed by the OpenAI chat-completions API
pub struct OpenAiJudge {
    config: OpenAiJudgeConfig,
    client: reqwest::Client,
}

impl OpenAiJudge {
    pub fn new(config: OpenAiJudgeConfig) -> JudgeResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("spaneval-judge/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }
}

/// Parse the judge's message content into a [`Verdict`].
pub fn parse_verdict(content: &str) -> JudgeResult<Verdict> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let verdict: Verdict = serde_json::from_str(trimmed)?;
    if verdict.label.trim().is_empty() {
        return Err(JudgeError::InvalidResponse("empty label".to_string()));
    }
    Ok(verdict)
}

#[async_trait]
impl Judge for OpenAiJudge {
    async fn score(&self, record: &JudgeRecord, kind: EvalName) -> JudgeResult<Verdict> {
        let request = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": SYSTEM_PROMPT
                },
                {
                    "role": "user",
                    "content": render(kind, record)
                }
            ],
            "temperature": 0.0,
            "response_format": { "type": "json_object" }
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(JudgeError::RateLimited);
            }
            let body = response.text().await.unwrap_or_default();
            return Err(JudgeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response_data: serde_json::Value = response.json().await?;
        let content = response_data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| JudgeError::InvalidResponse("Missing content".to_string()))?;

        debug!(eval = %kind, model = %self.config.model, "Judge responded");
        parse_verdict(content)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
