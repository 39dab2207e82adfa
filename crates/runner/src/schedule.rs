//! Boundary-aligned sleep scheduling (ground: `runner.py`'s
//! `calculate_sleep_seconds`).

use chrono::{NaiveDateTime, Timelike};

/// The next wall-clock instant whose minute is a multiple of
/// `interval_minutes`, seconds and sub-seconds zeroed (spec §4.1
/// "Scheduling"). Always strictly after `now` unless `now` is already
/// exactly on a boundary, in which case it advances one full period.
pub fn next_boundary(now: NaiveDateTime, interval_minutes: u32) -> NaiveDateTime {
    assert!(interval_minutes > 0, "interval_minutes must be positive");

    let minute = now.minute();
    let mut minutes_to_next = interval_minutes - (minute % interval_minutes);
    if minutes_to_next == 0 {
        minutes_to_next = interval_minutes;
    }

    let truncated = now
        .date()
        .and_hms_opt(now.hour(), now.minute(), 0)
        .expect("valid hour/minute from an existing NaiveDateTime");

    truncated + chrono::Duration::minutes(i64::from(minutes_to_next))
}

/// Seconds to sleep until the next boundary, never negative (spec §4.1
/// "Scheduling").
pub fn sleep_seconds(now: NaiveDateTime, interval_minutes: u32) -> f64 {
    let next = next_boundary(now, interval_minutes);
    let millis = next.signed_duration_since(now).num_milliseconds();
    (millis as f64 / 1000.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 7, 27)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    #[test]
    fn boundary_sleep_matches_spec_example() {
        // spec §8 scenario 5: work_interval=10, 10:03:00.000 -> 420s.
        let seconds = sleep_seconds(at(10, 3, 0), 10);
        assert!((seconds - 420.0).abs() < 1.0, "got {seconds}");
    }

    #[test]
    fn exactly_on_boundary_advances_full_period() {
        let next = next_boundary(at(10, 10, 0), 10);
        assert_eq!(next, at(10, 20, 0));
    }

    #[test]
    fn mid_period_rounds_up_to_next_boundary() {
        let next = next_boundary(at(10, 7, 30), 10);
        assert_eq!(next, at(10, 10, 0));
    }

    #[test]
    fn sleep_seconds_never_negative() {
        let seconds = sleep_seconds(at(10, 9, 59), 10);
        assert!(seconds >= 0.0);
    }

    #[test]
    fn idempotent_modulo_period() {
        let first = sleep_seconds(at(10, 3, 0), 10);
        let one_period_later = at(10, 13, 0);
        let second = sleep_seconds(one_period_later, 10);
        assert!((first - second).abs() < 1e-9);
    }
}
