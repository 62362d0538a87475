//! Error types for spaneval-core

use spaneval_store::StoreError;
use thiserror::Error;

/// Stage failure inside one evaluation cycle.
///
/// None of these end the process. `Fetch`, `PrimaryPublish` and `Panicked`
/// fail the cycle; `Snapshot` and `Secondary` are reported through a failed
/// [`PublishOutcome`](crate::publisher::PublishOutcome) instead.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[source] StoreError),

    #[error("primary publish failed: {0}")]
    PrimaryPublish(#[source] StoreError),

    #[error("snapshot failed: {0}")]
    Snapshot(#[source] StoreError),

    #[error("secondary publish failed: {0}")]
    Secondary(#[source] StoreError),

    /// A collaborator panicked while the cycle was running.
    #[error("unexpected failure: {0}")]
    Panicked(String),
}

impl CycleError {
    /// Stage tag used in `cycle.failed` log lines.
    pub fn stage(&self) -> &'static str {
        match self {
            CycleError::Fetch(_) => "fetch",
            CycleError::PrimaryPublish(_) => "publish",
            CycleError::Snapshot(_) => "snapshot",
            CycleError::Secondary(_) => "secondary",
            CycleError::Panicked(_) => "unexpected",
        }
    }
}

/// Invalid pipeline configuration, reported before the loop starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} is out of range")]
    OutOfRange { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_tags_are_distinct() {
        let err = || StoreError::Unavailable("down".to_string());
        let tags = [
            CycleError::Fetch(err()).stage(),
            CycleError::PrimaryPublish(err()).stage(),
            CycleError::Snapshot(err()).stage(),
            CycleError::Secondary(err()).stage(),
            CycleError::Panicked("boom".to_string()).stage(),
        ];
        for (i, a) in tags.iter().enumerate() {
            for b in &tags[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn display_includes_cause() {
        let err = CycleError::Fetch(StoreError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        });
        let msg = err.to_string();
        assert!(msg.starts_with("fetch failed"));
        assert!(msg.contains("502"));
    }
}
