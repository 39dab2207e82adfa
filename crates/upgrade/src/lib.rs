//! The Upgrade Controller: bootstrap/rollback via clone-then-exec
//! ("hop-scotch" upgrade — ground: `autofram.tools.bootstrap`/`rollback`,
//! `exec_runner`).
//!
//! The entry point that gets exec-replaced is `cargo run --release --bin
//! runner` in the target branch's working copy — the Rust-native analogue
//! of the original's `os.execv(sys.executable, [sys.executable,
//! "runner.py"])`: both re-invoke the target's own language toolchain on
//! its own source rather than assuming a prebuilt artifact exists, since a
//! branch the Runner just wrote to may not have been compiled yet.

use std::path::{Path, PathBuf};

use af_domain::error::Error;
use af_logging::LogSink;

/// Clone/update `branch` into its standard working-copy path, ensure its
/// `logs/` directory exists, and exec-replace this process with its
/// runner. Returns only on failure (ground: `tools.py bootstrap()` /
/// `rollback()`, both of which only return via the `exec_runner` path or
/// an unhandled exception).
pub fn bootstrap(branch: &str) -> Error {
    match bootstrap_inner(branch) {
        Ok(never) => never,
        Err(e) => e,
    }
}

/// Bootstrap to `main` to recover from a bad state (ground: `rollback()`).
pub fn rollback() -> Error {
    bootstrap("main")
}

fn bootstrap_inner(branch: &str) -> Result<Error, Error> {
    // Marker lives under main's logs dir regardless of which branch is being
    // bootstrapped to, because the Watcher only ever polls main (spec §3
    // "Bootstrap marker", §4.3 step 1: "the marker must be created before
    // the exec").
    af_logging::touch_bootstrap_marker(&af_git::branch_dir("main").join("logs"))?;

    let target_dir = af_git::branch_dir(branch);
    af_git::clone_or_update_branch(branch, &target_dir)?;

    let logs_dir = target_dir.join("logs");
    std::fs::create_dir_all(&logs_dir)?;

    exec_runner(&target_dir, branch)
}

/// Replace the current process image with the target branch's runner.
///
/// On unix this uses `execve` via `std::os::unix::process::CommandExt::exec`
/// and, on success, never returns — the function signature reflects that
/// by only producing an `Error` (an exec failure). On non-unix targets
/// (spec §9 "Self-exec") a portable fallback spawns the successor and
/// waits for its `bootstrap.log` `SUCCESS` line before this process exits.
fn exec_runner(target_dir: &Path, branch: &str) -> Result<Error, Error> {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;

        let err = std::process::Command::new("cargo")
            .args(["run", "--release", "--bin", "runner"])
            .current_dir(target_dir)
            .exec();
        Ok(Error::Other(format!(
            "exec into {} failed: {err}",
            target_dir.display()
        )))
    }

    #[cfg(not(unix))]
    {
        spawn_and_wait_for_success(target_dir, branch)
    }
}

/// Portable (non-exec) fallback: spawn the successor as a child, poll its
/// `bootstrap.log` for a `SUCCESS` line within a bounded timeout, then exit
/// this process so only the successor remains logically "in charge" (spec
/// §9: "the portable part; exec is an optimization").
#[cfg(not(unix))]
fn spawn_and_wait_for_success(target_dir: &Path, _branch: &str) -> Result<Error, Error> {
    const WAIT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);
    const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(500);

    let _child = std::process::Command::new("cargo")
        .args(["run", "--release", "--bin", "runner"])
        .current_dir(target_dir)
        .spawn()
        .map_err(|e| Error::Other(format!("spawning successor runner failed: {e}")))?;

    let logs_dir = target_dir.join("logs");
    let deadline = std::time::Instant::now() + WAIT_TIMEOUT;
    while std::time::Instant::now() < deadline {
        if af_logging::check_bootstrap_success(&logs_dir) {
            std::process::exit(0);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    Err(Error::Other(
        "successor runner did not report SUCCESS within timeout".to_string(),
    ))
}

/// Write the `BOOTSTRAPPING` bootstrap-log line and refresh the marker the
/// Watcher uses to suppress false-positive crash detection during an
/// in-flight upgrade (spec §3 "Bootstrap marker", §4.3 "Ordering
/// guarantees").
///
/// Called by the successor Runner at the start of its own startup
/// sequence, against a sink pointed at **main**'s `logs/` dir (not its own
/// working dir) — `bootstrap.log` and the marker are always main-pinned
/// since the Watcher only ever polls main, regardless of which branch the
/// Runner is currently running as. `bootstrap_inner` above already touches
/// the marker once before clone+exec; this refreshes it so a slow startup
/// (e.g. first `cargo build` of a freshly-cloned branch) still falls
/// within the grace window.
pub fn mark_bootstrapping(sink: &LogSink, branch: &str) -> std::io::Result<()> {
    af_logging::touch_bootstrap_marker(sink.logs_dir())?;
    sink.log_bootstrap("BOOTSTRAPPING", branch)
}

pub fn mark_bootstrap_success(sink: &LogSink, branch: &str) -> std::io::Result<()> {
    sink.log_bootstrap("SUCCESS", branch)
}

/// `PathBuf` resolution used by the `bootstrap`/`rollback` tool handlers
/// (kept here so `af-tools` doesn't need `af-git` directly).
pub fn branch_working_dir(branch: &str) -> PathBuf {
    af_git::branch_dir(branch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_working_dir_matches_git_layout() {
        std::env::set_var("AUTOFRAM_AGENT_ROOT", "/home/agent");
        assert_eq!(
            branch_working_dir("feature-x"),
            PathBuf::from("/home/agent/feature-x/autofram")
        );
        std::env::remove_var("AUTOFRAM_AGENT_ROOT");
    }

    #[test]
    fn bootstrap_inner_touches_main_marker_before_clone_even_on_failure() {
        let root = tempfile::tempdir().unwrap();
        std::env::set_var("AUTOFRAM_AGENT_ROOT", root.path());
        std::env::set_var("AUTOFRAM_REMOTE_REPO", "/no/such/remote");

        // The clone will fail (no such remote), but the marker must already
        // be on disk by the time that happens.
        let err = bootstrap_inner("feature-x").unwrap_err();
        assert!(matches!(err, Error::Git(_)));
        assert!(root.path().join("main/autofram/logs/bootstrapping").exists());

        std::env::remove_var("AUTOFRAM_AGENT_ROOT");
        std::env::remove_var("AUTOFRAM_REMOTE_REPO");
    }

    #[test]
    fn mark_bootstrapping_writes_marker_and_log_line() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::new(dir.path());
        mark_bootstrapping(&sink, "main").unwrap();
        assert!(dir.path().join("logs/bootstrapping").exists());
        let content = std::fs::read_to_string(dir.path().join("logs/bootstrap.log")).unwrap();
        assert!(content.starts_with("BOOTSTRAPPING"));
    }

    #[test]
    fn mark_bootstrap_success_appends_success_line() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::new(dir.path());
        mark_bootstrapping(&sink, "main").unwrap();
        mark_bootstrap_success(&sink, "main").unwrap();
        assert!(af_logging::check_bootstrap_success(sink.logs_dir()));
    }
}
