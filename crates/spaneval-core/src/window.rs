//! Window tracker
//!
//! Hands out one [`EvaluationWindow`] per cycle. The only state kept across
//! cycles is the end of the previous window (the cursor). Each window starts
//! `safety_overlap` before the cursor so late-arriving spans are still seen,
//! and the cursor moves forward as soon as a window is handed out: a failed
//! cycle is not retried.

use chrono::{DateTime, Duration, Utc};
use spaneval_store::EvaluationWindow;

use crate::error::ConfigError;

/// Upper bound for every policy duration.
const MAX_POLICY_SECS: i64 = 86_400;

/// Window arithmetic constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    initial_lookback: Duration,
    safety_overlap: Duration,
    min_window: Duration,
}

impl WindowPolicy {
    pub fn new(
        initial_lookback: Duration,
        safety_overlap: Duration,
        min_window: Duration,
    ) -> Result<Self, ConfigError> {
        if initial_lookback <= Duration::zero() {
            return Err(ConfigError::NotPositive {
                field: "initial_lookback",
            });
        }
        if safety_overlap < Duration::zero() {
            return Err(ConfigError::OutOfRange {
                field: "safety_overlap",
            });
        }
        if min_window <= Duration::zero() {
            return Err(ConfigError::NotPositive {
                field: "min_window",
            });
        }
        let max = Duration::seconds(MAX_POLICY_SECS);
        for (field, value) in [
            ("initial_lookback", initial_lookback),
            ("safety_overlap", safety_overlap),
            ("min_window", min_window),
        ] {
            if value > max {
                return Err(ConfigError::OutOfRange { field });
            }
        }
        Ok(Self {
            initial_lookback,
            safety_overlap,
            min_window,
        })
    }

    pub fn initial_lookback(&self) -> Duration {
        self.initial_lookback
    }

    pub fn safety_overlap(&self) -> Duration {
        self.safety_overlap
    }

    pub fn min_window(&self) -> Duration {
        self.min_window
    }
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            initial_lookback: Duration::seconds(80),
            safety_overlap: Duration::seconds(20),
            min_window: Duration::seconds(20),
        }
    }
}

/// Computes contiguous, possibly overlapping evaluation windows.
#[derive(Debug, Clone)]
pub struct WindowTracker {
    policy: WindowPolicy,
    last_end: DateTime<Utc>,
}

impl WindowTracker {
    /// Fresh tracker whose first window reaches `initial_lookback` into the past.
    pub fn new(policy: WindowPolicy, now: DateTime<Utc>) -> Self {
        Self {
            policy,
            last_end: now
                .checked_sub_signed(policy.initial_lookback)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// Tracker continuing from a known cursor.
    pub fn resume_from(policy: WindowPolicy, cursor: DateTime<Utc>) -> Self {
        Self {
            policy,
            last_end: cursor,
        }
    }

    /// End of the most recently handed-out window.
    pub fn cursor(&self) -> DateTime<Utc> {
        self.last_end
    }

    pub fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    /// Window for a cycle starting at `now`; advances the cursor.
    ///
    /// The end never moves backward. If the clock went backward far enough to
    /// leave an empty range, the window is clamped to `min_window` ending at
    /// the cursor.
    pub fn next_window(&mut self, now: DateTime<Utc>) -> EvaluationWindow {
        let end = now.max(self.last_end);
        let window = self
            .last_end
            .checked_sub_signed(self.policy.safety_overlap)
            .and_then(|start| EvaluationWindow::new(start, end).ok())
            .unwrap_or_else(|| EvaluationWindow::ending_at(end, self.policy.min_window));
        self.last_end = end;
        window
    }
}
