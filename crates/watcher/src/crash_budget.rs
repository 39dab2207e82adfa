//! Sliding-window crash counter (ground: `watcher.py::record_crash`).

use chrono::{DateTime, Utc};

/// Records crash timestamps and evicts anything older than a fixed window
/// (spec §4.6 steps 1-2, §8 "`crash_times` contains no timestamp older than
/// `CRASH_WINDOW_SECONDS`").
pub struct CrashBudget {
    window: chrono::Duration,
    limit: usize,
    times: Vec<DateTime<Utc>>,
}

impl CrashBudget {
    pub fn new(window_seconds: i64, limit: usize) -> Self {
        Self {
            window: chrono::Duration::seconds(window_seconds),
            limit,
            times: Vec::new(),
        }
    }

    /// Record a crash at `now`, evict stale entries, and return the
    /// resulting count.
    pub fn record(&mut self, now: DateTime<Utc>) -> usize {
        self.times.push(now);
        let cutoff = now - self.window;
        self.times.retain(|t| *t > cutoff);
        self.times.len()
    }

    pub fn limit_reached(&self) -> bool {
        self.times.len() >= self.limit
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn evicts_entries_older_than_window() {
        let mut budget = CrashBudget::new(3600, 5);
        budget.record(at(0));
        budget.record(at(1000));
        let count = budget.record(at(3700));
        // the first crash (at 0) is now older than the 3600s window from 3700.
        assert_eq!(count, 2);
    }

    #[test]
    fn limit_reached_at_exact_count() {
        let mut budget = CrashBudget::new(3600, 5);
        for i in 0..4 {
            budget.record(at(i * 10));
            assert!(!budget.limit_reached());
        }
        budget.record(at(40));
        assert!(budget.limit_reached());
        assert_eq!(budget.len(), 5);
    }

    #[test]
    fn empty_budget_has_no_crashes() {
        let budget = CrashBudget::new(3600, 5);
        assert!(budget.is_empty());
    }
}
