//! Result publisher
//!
//! Step 1 writes the named result sets to the trace store; it is skipped
//! when every set is empty. Step 2 reads the window's span and evaluation
//! snapshot back and mirrors it to the analytics backend. Step 3 inspects
//! the backend's answer. Only step 1 can fail the publish; anything after it
//! is reported as a failed [`PublishOutcome`] and leaves the annotations
//! already written in place.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use spaneval_store::{
    AnalyticsSink, EvalTarget, EvaluationWindow, ModelTag, NamedResultSet, TraceStore,
};

use crate::error::CycleError;
use crate::metrics::METRICS;
use crate::obs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Trace store holding the annotations
    Primary,
    /// Analytics backend receiving the mirror
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Succeeded,
    Failed,
}

/// Result of one publish step against one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub backend: Backend,
    pub status: PublishStatus,
    /// HTTP status when the backend answered
    pub status_code: Option<u16>,
    pub detail: String,
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        self.status == PublishStatus::Succeeded
    }
}

pub struct ResultPublisher {
    store: Arc<dyn TraceStore>,
    sink: Arc<dyn AnalyticsSink>,
    model: ModelTag,
}

impl ResultPublisher {
    pub fn new(store: Arc<dyn TraceStore>, sink: Arc<dyn AnalyticsSink>, model: ModelTag) -> Self {
        Self { store, sink, model }
    }

    pub fn model(&self) -> &ModelTag {
        &self.model
    }

    /// Publish result sets for `window`.
    ///
    /// Returns `Err(CycleError::PrimaryPublish)` when the annotations could
    /// not be written; the mirror is skipped in that case. Otherwise returns
    /// one outcome per backend.
    pub async fn publish(
        &self,
        window: &EvaluationWindow,
        sets: &[&NamedResultSet],
    ) -> Result<Vec<PublishOutcome>, CycleError> {
        let sets: Vec<NamedResultSet> = sets
            .iter()
            .map(|set| dedupe(set))
            .filter(|set| !set.is_empty())
            .collect();
        let results: usize = sets.iter().map(NamedResultSet::len).sum();

        let detail = if sets.is_empty() {
            "0 results".to_string()
        } else {
            if let Err(e) = self.store.log_evaluations(&sets).await {
                obs::emit_publish_primary_failed(&e);
                return Err(CycleError::PrimaryPublish(e));
            }
            format!("{} result sets, {} results", sets.len(), results)
        };
        obs::emit_publish_primary(sets.len(), results);
        let primary = PublishOutcome {
            backend: Backend::Primary,
            status: PublishStatus::Succeeded,
            status_code: None,
            detail,
        };

        let secondary = self.mirror(window).await;
        if !secondary.is_success() {
            METRICS.inc_secondary_failures();
        }

        Ok(vec![primary, secondary])
    }

    async fn mirror(&self, window: &EvaluationWindow) -> PublishOutcome {
        let snapshot = match self.store.trace_snapshot(window).await {
            Ok(snapshot) => snapshot,
            Err(e) => return secondary_failure(CycleError::Snapshot(e)),
        };

        let response = match self
            .sink
            .log_spans(&snapshot.spans, &snapshot.evaluations, &self.model)
            .await
        {
            Ok(response) => response,
            Err(e) => return secondary_failure(CycleError::Secondary(e)),
        };

        if response.is_success() {
            obs::emit_publish_secondary(
                response.status_code,
                snapshot.spans.len(),
                snapshot.evaluations.len(),
            );
            PublishOutcome {
                backend: Backend::Secondary,
                status: PublishStatus::Succeeded,
                status_code: Some(response.status_code),
                detail: format!(
                    "{} spans, {} evaluations",
                    snapshot.spans.len(),
                    snapshot.evaluations.len()
                ),
            }
        } else {
            obs::emit_publish_secondary_rejected(response.status_code, &response.body);
            PublishOutcome {
                backend: Backend::Secondary,
                status: PublishStatus::Failed,
                status_code: Some(response.status_code),
                detail: response.body,
            }
        }
    }
}

fn secondary_failure(error: CycleError) -> PublishOutcome {
    obs::emit_publish_secondary_failed(&error);
    PublishOutcome {
        backend: Backend::Secondary,
        status: PublishStatus::Failed,
        status_code: None,
        detail: error.to_string(),
    }
}

/// Collapse duplicate targets within one set; the last result wins and
/// keeps the position of the first.
pub fn dedupe(set: &NamedResultSet) -> NamedResultSet {
    let mut index: HashMap<&EvalTarget, usize> = HashMap::new();
    let mut results = Vec::with_capacity(set.results.len());
    for result in &set.results {
        match index.get(&result.target) {
            Some(&i) => results[i] = result.clone(),
            None => {
                index.insert(&result.target, results.len());
                results.push(result.clone());
            }
        }
    }
    NamedResultSet::new(set.eval_name, results)
}
