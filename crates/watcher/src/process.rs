//! Runner process discovery and termination (ground: `watcher.py`'s
//! `find_runner_process`, `is_runner_cmdline`, `terminate_process`).
//!
//! Spec §9 ("Process discovery by argv substring") calls the argv scan
//! fragile and names a PID file as the robust replacement, argv-scan kept
//! as fallback. Spec §4.5 mandates the argv scan as the baseline
//! discriminator, so this module keeps that order: argv scan first, then a
//! PID-file cross-check for the case where the scan can't see the process
//! (e.g. a sandboxed `/proc`) but a freshly-written PID file still names a
//! live PID.

use std::path::Path;
use std::time::{Duration, Instant};

use sysinfo::{Pid, System};

pub const RUNNER_BIN_NAME: &str = "runner";
pub const WATCHER_BIN_NAME: &str = "watcher";

/// Whether a command line identifies the Runner: contains the runner binary
/// name and excludes the watcher's own (spec §4.5 "Find runner").
pub fn is_runner_cmdline(cmdline: &[String]) -> bool {
    let joined = cmdline.join(" ");
    joined.contains(RUNNER_BIN_NAME) && !joined.contains(WATCHER_BIN_NAME)
}

/// Scan all processes for one whose command line matches
/// [`is_runner_cmdline`].
pub fn find_runner(sys: &System) -> Option<Pid> {
    for (pid, process) in sys.processes() {
        let cmdline: Vec<String> = process
            .cmd()
            .iter()
            .map(|s| s.to_string_lossy().to_string())
            .collect();
        if is_runner_cmdline(&cmdline) {
            return Some(*pid);
        }
    }
    None
}

/// Fallback for when the argv scan above comes up empty: read
/// `<main_dir>/logs/runner.pid` and check whether that PID is still alive
/// (spec §9's "robust replacement", kept secondary per DESIGN.md's Open
/// Question decision).
pub fn find_runner_via_pidfile(sys: &System, main_dir: &Path) -> Option<Pid> {
    let raw = std::fs::read_to_string(main_dir.join("logs/runner.pid")).ok()?;
    let pid: u32 = raw.trim().parse().ok()?;
    let pid = Pid::from_u32(pid);
    sys.process(pid).map(|_| pid)
}

pub fn cpu_percent(sys: &System, pid: Pid) -> Option<f32> {
    sys.process(pid).map(|p| p.cpu_usage())
}

/// Terminate gracefully: SIGTERM, poll for exit up to `wait`, else SIGKILL
/// (ground: `watcher.py::terminate_process`).
pub fn terminate(sys: &mut System, pid: Pid, wait: Duration) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid as NixPid;

    let nix_pid = NixPid::from_raw(pid.as_u32() as i32);
    if kill(nix_pid, Signal::SIGTERM).is_err() {
        return;
    }

    let deadline = Instant::now() + wait;
    loop {
        sys.refresh_all();
        if sys.process(pid).is_none() {
            return;
        }
        if Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(200));
    }
    let _ = kill(nix_pid, Signal::SIGKILL);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_runner_cmdline() {
        let cmdline = vec!["/usr/bin/runner".to_string()];
        assert!(is_runner_cmdline(&cmdline));
    }

    #[test]
    fn excludes_watcher_cmdline() {
        let cmdline = vec!["/usr/bin/watcher".to_string()];
        assert!(!is_runner_cmdline(&cmdline));
    }

    #[test]
    fn rejects_unrelated_cmdline() {
        let cmdline = vec!["/usr/bin/bash".to_string(), "-c".to_string(), "sleep 5".to_string()];
        assert!(!is_runner_cmdline(&cmdline));
    }

    #[test]
    fn pidfile_fallback_absent_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let sys = System::new();
        assert!(find_runner_via_pidfile(&sys, dir.path()).is_none());
    }
}
