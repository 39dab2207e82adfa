//! CPU runaway + log explosion detection (ground: `watcher.py::check_cpu_health`,
//! `check_log_size`).

use std::path::Path;
use std::time::{Duration, Instant};

/// Tracks sustained high-CPU samples across polling ticks (spec §4.5
/// "CPU runaway"). A sample below threshold resets the tracker.
pub struct CpuTracker {
    threshold: f32,
    duration: Duration,
    high_cpu_start: Option<Instant>,
}

impl CpuTracker {
    pub fn new(threshold: f32, duration: Duration) -> Self {
        Self {
            threshold,
            duration,
            high_cpu_start: None,
        }
    }

    /// Feed one `cpu_percent` sample. Returns `Some(reason)` once the CPU
    /// has stayed at or above `threshold` for at least `duration`.
    pub fn sample(&mut self, cpu_percent: f32) -> Option<String> {
        if cpu_percent >= self.threshold {
            let start = *self.high_cpu_start.get_or_insert_with(Instant::now);
            if start.elapsed() >= self.duration {
                return Some(format!(
                    "CPU runaway detected ({cpu_percent:.1}% for {}s)",
                    self.duration.as_secs()
                ));
            }
            None
        } else {
            self.high_cpu_start = None;
            None
        }
    }

    pub fn reset(&mut self) {
        self.high_cpu_start = None;
    }
}

/// `errors.log` size over `limit_bytes` (spec §4.5 "Log explosion").
pub fn log_explosion(errors_log: &Path, limit_bytes: u64) -> Option<String> {
    let size = std::fs::metadata(errors_log).map(|m| m.len()).unwrap_or(0);
    if size > limit_bytes {
        Some(format!("Log explosion detected ({size} bytes)"))
    } else {
        None
    }
}
