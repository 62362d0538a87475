//! Cycle scheduler
//!
//! Drives window -> fetch -> evaluate -> publish once per interval. Cycles
//! run strictly one after another on the caller's task. Every stage returns
//! a typed result which the scheduler folds into a [`CycleStatus`]; nothing
//! a cycle does can end the loop. A panic inside a stage is caught here and
//! reported as a failed cycle.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use spaneval_judge::Judge;
use spaneval_store::{AnalyticsSink, EvaluationWindow, TraceStore};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{ConfigError, CycleError};
use crate::fetcher::TraceFetcher;
use crate::metrics::METRICS;
use crate::obs;
use crate::publisher::{Backend, PublishOutcome, ResultPublisher};
use crate::runner::{EvaluationRunner, EvaluatorStats, RunOutcome};
use crate::window::{WindowPolicy, WindowTracker};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Sleeping between cycles
    Idle,
    /// Executing one cycle
    Running,
}

/// Summary of a cycle that reached the publish step.
///
/// When every judge call failed the primary outcome reads "0 results" and
/// the window is still mirrored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub qa_records: usize,
    pub document_sets: usize,
    pub documents: usize,
    pub skipped: usize,
    pub stats: [EvaluatorStats; 3],
    pub outcomes: Vec<PublishOutcome>,
}

impl CycleReport {
    pub fn outcome(&self, backend: Backend) -> Option<&PublishOutcome> {
        self.outcomes.iter().find(|o| o.backend == backend)
    }
}

#[derive(Debug)]
pub enum CycleStatus {
    /// Results were written to the trace store (the mirror may still have failed)
    Completed(CycleReport),
    /// The window held no QA records and no document sets
    NothingToEvaluate,
    Failed(CycleError),
}

impl CycleStatus {
    pub fn tag(&self) -> &'static str {
        match self {
            CycleStatus::Completed(_) => "completed",
            CycleStatus::NothingToEvaluate => "nothing_to_evaluate",
            CycleStatus::Failed(_) => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CycleStatus::Failed(_))
    }
}

#[derive(Debug)]
pub struct CycleOutcome {
    pub cycle_id: Uuid,
    pub window: EvaluationWindow,
    pub status: CycleStatus,
    pub duration: Duration,
}

/// Owns the window cursor and the three collaborator-backed stages.
pub struct CycleScheduler {
    policy: WindowPolicy,
    /// Seeded by the first cycle unless a tracker was supplied
    tracker: Option<WindowTracker>,
    fetcher: TraceFetcher,
    runner: EvaluationRunner,
    publisher: ResultPublisher,
    cycle_interval: Duration,
    startup_delay: Duration,
    state: SchedulerState,
    clock: Clock,
}

impl CycleScheduler {
    /// Validate `config` and wire the stages to their collaborators.
    ///
    /// The first window reaches `initial_lookback` behind the time the first
    /// cycle runs, so the startup delay does not widen it.
    pub fn new(
        config: &PipelineConfig,
        store: Arc<dyn TraceStore>,
        sink: Arc<dyn AnalyticsSink>,
        judge: Arc<dyn Judge>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            policy: config.window_policy()?,
            tracker: None,
            fetcher: TraceFetcher::new(store.clone()),
            runner: EvaluationRunner::new(judge, config.judge_concurrency),
            publisher: ResultPublisher::new(store, sink, config.model.clone()),
            cycle_interval: config.cycle_interval,
            startup_delay: config.startup_delay,
            state: SchedulerState::Idle,
            clock: Arc::new(Utc::now),
        })
    }

    /// Replace the window tracker, e.g. to resume from a known cursor.
    pub fn with_tracker(mut self, tracker: WindowTracker) -> Self {
        self.policy = *tracker.policy();
        self.tracker = Some(tracker);
        self
    }

    /// Replace the wall clock used by [`run_once`](Self::run_once) and
    /// [`run_forever`](Self::run_forever).
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// End of the last window handed out; `None` before the first cycle.
    pub fn cursor(&self) -> Option<DateTime<Utc>> {
        self.tracker.as_ref().map(WindowTracker::cursor)
    }

    /// Run one cycle for a window ending at (or after) `now`.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        let cycle_id = Uuid::new_v4();
        let span = obs::cycle_span(&cycle_id.to_string());

        self.state = SchedulerState::Running;
        let outcome = self.cycle(cycle_id, now).instrument(span).await;
        self.state = SchedulerState::Idle;
        outcome
    }

    /// Run one cycle at the clock's current time.
    pub async fn run_once(&mut self) -> CycleOutcome {
        let now = (self.clock)();
        self.run_cycle(now).await
    }

    /// Wait out the startup delay, then run a cycle every interval. Never returns.
    pub async fn run_forever(&mut self) {
        if !self.startup_delay.is_zero() {
            info!(
                delay_secs = self.startup_delay.as_secs(),
                "Waiting for the trace store before the first cycle"
            );
            tokio::time::sleep(self.startup_delay).await;
        }

        loop {
            self.run_once().await;
            tokio::time::sleep(self.cycle_interval).await;
        }
    }

    async fn cycle(&mut self, cycle_id: Uuid, now: DateTime<Utc>) -> CycleOutcome {
        let started = tokio::time::Instant::now();
        obs::emit_cycle_started(&cycle_id.to_string());
        METRICS.inc_cycles_started();

        let policy = self.policy;
        let window = self
            .tracker
            .get_or_insert_with(|| WindowTracker::new(policy, now))
            .next_window(now);
        obs::emit_window_computed(&window);

        let status = match AssertUnwindSafe(self.evaluate_window(&window)).catch_unwind().await {
            Ok(status) => status,
            Err(payload) => CycleStatus::Failed(CycleError::Panicked(panic_message(payload))),
        };
        if let CycleStatus::Failed(e) = &status {
            METRICS.inc_cycles_failed();
            obs::emit_cycle_failed(e.stage(), e);
        }

        let duration = started.elapsed();
        obs::emit_cycle_finished(duration.as_millis() as u64, status.tag());
        METRICS.flush();

        CycleOutcome {
            cycle_id,
            window,
            status,
            duration,
        }
    }

    async fn evaluate_window(&self, window: &EvaluationWindow) -> CycleStatus {
        let fetched = match self.fetcher.fetch(window).await {
            Ok(fetched) => fetched,
            Err(e) => return CycleStatus::Failed(CycleError::Fetch(e)),
        };
        obs::emit_fetch_completed(
            fetched.qa_records.len(),
            fetched.document_sets.len(),
            fetched.skipped(),
        );

        let batch = match self.runner.run(&fetched).await {
            RunOutcome::NothingToEvaluate => {
                obs::emit_nothing_to_evaluate(window);
                return CycleStatus::NothingToEvaluate;
            }
            RunOutcome::Evaluated(batch) => batch,
        };

        if batch.is_empty() {
            warn!(
                event = "cycle.no_results",
                "Every judge call failed; mirroring spans without new annotations"
            );
        }

        match self.publisher.publish(window, &batch.sets()).await {
            Ok(outcomes) => CycleStatus::Completed(CycleReport {
                qa_records: fetched.qa_records.len(),
                document_sets: fetched.document_sets.len(),
                documents: fetched.document_count(),
                skipped: fetched.skipped(),
                stats: batch.stats,
                outcomes,
            }),
            Err(e) => CycleStatus::Failed(e),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
