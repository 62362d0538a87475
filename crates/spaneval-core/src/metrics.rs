//! Global atomic counters for the evaluation loop.
//!
//! Counters are incremented at the call site and emitted together by
//! [`Metrics::flush`] at the end of every cycle.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations, no locking.
pub struct Metrics {
    cycles_started: AtomicU64,
    cycles_failed: AtomicU64,
    records_scored: AtomicU64,
    judge_failures: AtomicU64,
    secondary_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            cycles_started: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            records_scored: AtomicU64::new(0),
            judge_failures: AtomicU64::new(0),
            secondary_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_cycles_started(&self) {
        self.cycles_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "cycles_started", "counter incremented");
    }

    pub fn inc_cycles_failed(&self) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "cycles_failed", "counter incremented");
    }

    /// Add `n` successfully scored records.
    pub fn add_records_scored(&self, n: u64) {
        self.records_scored.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "records_scored", n, "counter incremented");
    }

    /// Add `n` judge calls that failed or answered off the rails.
    pub fn add_judge_failures(&self, n: u64) {
        self.judge_failures.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "judge_failures", n, "counter incremented");
    }

    pub fn inc_secondary_failures(&self) {
        self.secondary_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "secondary_failures", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            cycles_started = self.cycles_started(),
            cycles_failed = self.cycles_failed(),
            records_scored = self.records_scored(),
            judge_failures = self.judge_failures(),
            secondary_failures = self.secondary_failures(),
        );
    }

    pub fn cycles_started(&self) -> u64 {
        self.cycles_started.load(Ordering::Relaxed)
    }

    pub fn cycles_failed(&self) -> u64 {
        self.cycles_failed.load(Ordering::Relaxed)
    }

    pub fn records_scored(&self) -> u64 {
        self.records_scored.load(Ordering::Relaxed)
    }

    pub fn judge_failures(&self) -> u64 {
        self.judge_failures.load(Ordering::Relaxed)
    }

    pub fn secondary_failures(&self) -> u64 {
        self.secondary_failures.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.cycles_started.store(0, Ordering::Relaxed);
        self.cycles_failed.store(0, Ordering::Relaxed);
        self.records_scored.store(0, Ordering::Relaxed);
        self.judge_failures.store(0, Ordering::Relaxed);
        self.secondary_failures.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_cycles_started();
        m.inc_cycles_started();
        m.inc_cycles_failed();
        m.add_records_scored(5);
        m.add_judge_failures(2);
        m.inc_secondary_failures();

        assert_eq!(m.cycles_started(), 2);
        assert_eq!(m.cycles_failed(), 1);
        assert_eq!(m.records_scored(), 5);
        assert_eq!(m.judge_failures(), 2);
        assert_eq!(m.secondary_failures(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_cycles_started();
        m.add_records_scored(3);
        m.inc_secondary_failures();
        m.reset();
        assert_eq!(m.cycles_started(), 0);
        assert_eq!(m.records_scored(), 0);
        assert_eq!(m.secondary_failures(), 0);
    }
}
