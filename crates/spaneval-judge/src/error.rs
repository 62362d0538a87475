//! Error types for spaneval-judge

use thiserror::Error;

/// Errors from a single judge invocation
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("label {label:?} is not one of {rails:?}")]
    UnknownLabel { label: String, rails: Vec<String> },

    #[error("Judge unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for JudgeError {
    fn from(err: reqwest::Error) -> Self {
        JudgeError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for JudgeError {
    fn from(err: serde_json::Error) -> Self {
        JudgeError::InvalidResponse(err.to_string())
    }
}
