//! The Watcher binary: crash-recovery supervisor for the Runner (spec §4.5,
//! §4.6; ground: `watcher.py::main`). No flags — driven entirely by
//! environment and cwd (spec §6 "CLI surface").

use std::time::Duration;

use af_domain::config::WatcherConfig;
use af_logging::LogSink;
use af_watcher::{monitor_iteration, TickOutcome, WatcherState};
use sysinfo::System;
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();

    let main_dir = af_git::branch_dir("main");
    let config = WatcherConfig::from_env(main_dir);
    let sink = LogSink::new(&config.main_dir);

    let _ = sink.log_watcher("Watcher starting...");
    std::thread::sleep(Duration::from_secs(WatcherConfig::CHECK_INTERVAL_SECONDS));

    let mut state = WatcherState::new(&config);
    let mut sys = System::new_all();

    loop {
        sys.refresh_all();

        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            monitor_iteration(&mut sys, &config, &mut state, &sink)
        })) {
            Ok(outcome) => {
                if outcome == TickOutcome::CrashLimitReached {
                    std::thread::sleep(Duration::from_secs(WatcherConfig::POST_CRASH_LIMIT_DELAY_SECONDS));
                    continue;
                }
                if outcome == TickOutcome::Restarted {
                    std::thread::sleep(Duration::from_secs(WatcherConfig::POST_LAUNCH_DELAY_SECONDS));
                }
            }
            Err(_) => {
                let _ = sink.log_watcher("Watcher error: panic during monitor_iteration");
            }
        }

        std::thread::sleep(config.check_interval());
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
