//! Pipeline configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use spaneval_store::ModelTag;

use crate::error::ConfigError;
use crate::window::WindowPolicy;

pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_INITIAL_LOOKBACK: Duration = Duration::from_secs(80);
pub const DEFAULT_SAFETY_OVERLAP: Duration = Duration::from_secs(20);
pub const DEFAULT_MIN_WINDOW: Duration = Duration::from_secs(20);
pub const DEFAULT_JUDGE_CONCURRENCY: usize = 8;

/// Cadence, window arithmetic and judge fan-out for the evaluation loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sleep between the end of one cycle and the start of the next
    pub cycle_interval: Duration,
    /// Delay before the first cycle
    pub startup_delay: Duration,
    /// Cold-start lookback for the first window
    pub initial_lookback: Duration,
    /// Overlap subtracted from the previous window end
    pub safety_overlap: Duration,
    /// Window width used when the clock goes backward
    pub min_window: Duration,
    /// Concurrent judge calls per evaluator
    pub judge_concurrency: usize,
    /// Model identity attached to analytics mirrors
    pub model: ModelTag,
}

impl PipelineConfig {
    pub fn new(model: ModelTag) -> Self {
        Self {
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
            startup_delay: DEFAULT_STARTUP_DELAY,
            initial_lookback: DEFAULT_INITIAL_LOOKBACK,
            safety_overlap: DEFAULT_SAFETY_OVERLAP,
            min_window: DEFAULT_MIN_WINDOW,
            judge_concurrency: DEFAULT_JUDGE_CONCURRENCY,
            model,
        }
    }

    pub fn with_cycle_interval(mut self, interval: Duration) -> Self {
        self.cycle_interval = interval;
        self
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn with_initial_lookback(mut self, lookback: Duration) -> Self {
        self.initial_lookback = lookback;
        self
    }

    pub fn with_safety_overlap(mut self, overlap: Duration) -> Self {
        self.safety_overlap = overlap;
        self
    }

    pub fn with_min_window(mut self, min_window: Duration) -> Self {
        self.min_window = min_window;
        self
    }

    pub fn with_judge_concurrency(mut self, concurrency: usize) -> Self {
        self.judge_concurrency = concurrency;
        self
    }

    /// Reject configurations the loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_interval.is_zero() {
            return Err(ConfigError::NotPositive {
                field: "cycle_interval",
            });
        }
        if self.judge_concurrency == 0 {
            return Err(ConfigError::NotPositive {
                field: "judge_concurrency",
            });
        }
        if self.model.model_id.trim().is_empty() {
            return Err(ConfigError::Empty { field: "model_id" });
        }
        if self.model.model_version.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "model_version",
            });
        }
        self.window_policy().map(|_| ())
    }

    /// Window arithmetic derived from this configuration.
    pub fn window_policy(&self) -> Result<WindowPolicy, ConfigError> {
        WindowPolicy::new(
            to_delta(self.initial_lookback, "initial_lookback")?,
            to_delta(self.safety_overlap, "safety_overlap")?,
            to_delta(self.min_window, "min_window")?,
        )
    }
}

fn to_delta(value: Duration, field: &'static str) -> Result<chrono::Duration, ConfigError> {
    chrono::Duration::from_std(value).map_err(|_| ConfigError::OutOfRange { field })
}
