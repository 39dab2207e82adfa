//! The Watcher: a crash-recovery supervisor for the Runner process
//! (ground: `watcher.py`).

pub mod alert;
pub mod crash_budget;
pub mod health;
pub mod process;

use std::time::Duration;

use af_domain::config::WatcherConfig;
use af_logging::LogSink;
use chrono::Utc;
use sysinfo::System;

use crash_budget::CrashBudget;
use health::CpuTracker;

/// Mutable supervision state carried across poll ticks (spec §3 "Runner
/// session"-analogue for the Watcher: crash history + CPU-runaway tracker).
pub struct WatcherState {
    pub crash_budget: CrashBudget,
    pub cpu_tracker: CpuTracker,
}

impl WatcherState {
    pub fn new(config: &WatcherConfig) -> Self {
        Self {
            crash_budget: CrashBudget::new(WatcherConfig::CRASH_WINDOW_SECONDS, WatcherConfig::CRASH_LIMIT),
            cpu_tracker: CpuTracker::new(
                WatcherConfig::CPU_THRESHOLD_PERCENT,
                Duration::from_secs(WatcherConfig::CPU_DURATION_SECONDS),
            ),
        }
    }
}

/// Outcome of one `monitor_iteration` tick, for logging/testing.
#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The Runner is present and healthy.
    Healthy,
    /// A bootstrap is in flight; the Runner's absence was not treated as a
    /// crash (spec §4.5 "handle_missing" step 1).
    BootstrapInFlight,
    /// The Runner was unhealthy or missing, a restart was attempted.
    Restarted,
    /// The crash budget was exhausted; a PM alert was sent and restarts are
    /// paused (spec §4.6 step 2).
    CrashLimitReached,
}

/// Run one supervision iteration (spec §4.5 "States per iteration").
///
/// `sys` should have been refreshed by the caller immediately before this
/// call so CPU percentages reflect the interval since the previous tick.
pub fn monitor_iteration(sys: &mut System, config: &WatcherConfig, state: &mut WatcherState, sink: &LogSink) -> TickOutcome {
    let logs_dir = config.main_dir.join("logs");

    let found = process::find_runner(sys).or_else(|| process::find_runner_via_pidfile(sys, &config.main_dir));

    let Some(pid) = found else {
        return handle_missing(config, state, sink, &logs_dir);
    };

    if let Some(reason) = health_check(sys, pid, config, state) {
        let _ = sink.log_watcher(&format!("Unhealthy runner: {reason}"));
        process::terminate(sys, pid, Duration::from_secs(WatcherConfig::TERMINATE_WAIT_SECONDS));
        return crash_and_restart(config, state, sink);
    }

    TickOutcome::Healthy
}

fn handle_missing(config: &WatcherConfig, state: &mut WatcherState, sink: &LogSink, logs_dir: &std::path::Path) -> TickOutcome {
    let _ = sink.log_watcher("Runner not found!");

    if af_logging::bootstrap_marker_fresh(logs_dir, Duration::from_secs(WatcherConfig::BOOTSTRAP_GRACE_SECONDS)) {
        return TickOutcome::BootstrapInFlight;
    }

    if !af_logging::check_bootstrap_success(logs_dir) {
        let _ = sink.log_watcher("Bootstrap failed, falling back to main");
    }

    crash_and_restart(config, state, sink)
}

fn health_check(sys: &System, pid: sysinfo::Pid, config: &WatcherConfig, state: &mut WatcherState) -> Option<String> {
    let cpu = process::cpu_percent(sys, pid)?;
    if let Some(reason) = state.cpu_tracker.sample(cpu) {
        return Some(reason);
    }

    let errors_log = config.main_dir.join("logs/errors.log");
    health::log_explosion(&errors_log, WatcherConfig::LOG_SIZE_LIMIT_BYTES)
}

/// Record a crash, and either alert+pause or launch a fresh runner (spec
/// §4.6).
fn crash_and_restart(config: &WatcherConfig, state: &mut WatcherState, sink: &LogSink) -> TickOutcome {
    let count = state.crash_budget.record(Utc::now());
    let _ = sink.log_watcher(&format!(
        "Crash recorded. {count} crashes in last {} minutes.",
        WatcherConfig::CRASH_WINDOW_SECONDS / 60
    ));

    if state.crash_budget.limit_reached() {
        let message = format!(
            "Agent has crashed {} times in {} minutes. Manual intervention required.",
            WatcherConfig::CRASH_LIMIT,
            WatcherConfig::CRASH_WINDOW_SECONDS / 60
        );
        let _ = sink.log_watcher(&format!("ALERT: {message}"));
        alert::alert_pm(&config.main_dir, &message);
        let _ = sink.log_watcher("Crash limit reached. Stopping restart attempts.");
        return TickOutcome::CrashLimitReached;
    }

    launch_runner(config, state, sink);
    TickOutcome::Restarted
}

/// Resync `main` and spawn a fresh Runner, detached (ground:
/// `watcher.py::launch_runner`).
fn launch_runner(config: &WatcherConfig, state: &mut WatcherState, sink: &LogSink) {
    state.cpu_tracker.reset();
    let _ = sink.log_watcher("Launching runner from main...");

    if !af_git::sync(&config.main_dir, "main") {
        let _ = sink.log_watcher("Warning: git sync failed");
    }

    std::fs::create_dir_all(config.main_dir.join("logs")).ok();

    match spawn_runner(&config.main_dir) {
        Ok(()) => {
            let _ = sink.log_watcher("Runner launched.");
        }
        Err(e) => {
            let _ = sink.log_watcher(&format!("ERROR: failed to launch runner: {e}"));
        }
    }
}

#[cfg(unix)]
fn spawn_runner(main_dir: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::process::CommandExt;

    std::process::Command::new("cargo")
        .args(["run", "--release", "--bin", "runner"])
        .current_dir(main_dir)
        .process_group(0)
        .spawn()
        .map(|_child| ())
}

#[cfg(not(unix))]
fn spawn_runner(main_dir: &std::path::Path) -> std::io::Result<()> {
    std::process::Command::new("cargo")
        .args(["run", "--release", "--bin", "runner"])
        .current_dir(main_dir)
        .spawn()
        .map(|_child| ())
}
