//! Coverage properties of the window tracker over long cycle sequences.

use chrono::{DateTime, Duration, TimeZone, Utc};
use spaneval_core::{WindowPolicy, WindowTracker};

fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

/// Deterministic pseudo-random offsets in `[-30, 150)` seconds, so the
/// sequence includes stalls, long gaps and clock steps backward.
fn offsets(seed: u64, n: usize) -> Vec<i64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) % 180) as i64 - 30
        })
        .collect()
}

fn policies() -> Vec<WindowPolicy> {
    vec![
        WindowPolicy::default(),
        WindowPolicy::new(Duration::seconds(80), Duration::zero(), Duration::seconds(5)).unwrap(),
        WindowPolicy::new(
            Duration::seconds(10),
            Duration::seconds(3),
            Duration::seconds(1),
        )
        .unwrap(),
    ]
}

#[test]
fn windows_never_leave_a_gap_and_ends_never_decrease() {
    for policy in policies() {
        for seed in 1..=20 {
            let mut tracker = WindowTracker::new(policy, t0());
            let mut now = t0();
            let mut previous = tracker.next_window(now);
            assert!(previous.start() < previous.end());

            for step in offsets(seed, 200) {
                now += Duration::seconds(step);
                let window = tracker.next_window(now);

                assert!(window.start() < window.end(), "empty window {window}");
                assert!(
                    window.start() <= previous.end(),
                    "gap between {previous} and {window}"
                );
                assert!(window.end() >= previous.end(), "end moved backward");
                assert_eq!(tracker.cursor(), window.end());
                previous = window;
            }
        }
    }
}

#[test]
fn union_of_windows_covers_elapsed_time() {
    let policy = WindowPolicy::default();
    let mut tracker = WindowTracker::new(policy, t0());
    let mut now = t0();
    let first = tracker.next_window(now);
    let mut covered_until = first.end();

    for step in offsets(7, 500) {
        now += Duration::seconds(step);
        let window = tracker.next_window(now);
        assert!(window.start() <= covered_until);
        covered_until = covered_until.max(window.end());
    }

    assert!(first.start() <= t0() - policy.initial_lookback());
    assert!(covered_until >= now);
}

#[test]
fn overlap_is_bounded_at_steady_cadence() {
    let policy = WindowPolicy::default();
    let mut tracker = WindowTracker::new(policy, t0());
    let mut previous = tracker.next_window(t0());

    for i in 1..=50 {
        let window = tracker.next_window(t0() + Duration::seconds(60 * i));
        assert_eq!(previous.end() - window.start(), policy.safety_overlap());
        previous = window;
    }
}
