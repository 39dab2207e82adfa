//! The Log Sink (ground: `autofram.logger_out.LoggerOut`).
//!
//! Five files live under `<working_dir>/logs/`:
//! - `runner.log`   — rotating (5 MiB × 3), Runner-only.
//! - `watcher.log`  — append-only, Watcher-only.
//! - `bootstrap.log`— append-only `<STATUS> <UTC-ISO8601> <branch>` lines.
//! - `errors.log`   — truncated at Runner startup, appended thereafter.
//! - `model.log`    — JSON-per-line request/response/tool_result records.
//! - `contracts.log`— free-text sub-agent commentary (af-contracts).

mod rotate;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;

pub use rotate::SizeRotatingWriter;

pub const RUNNER_LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const RUNNER_LOG_BACKUP_COUNT: u32 = 3;

/// Handle to the `logs/` directory under a branch working copy.
#[derive(Clone)]
pub struct LogSink {
    logs_dir: PathBuf,
}

impl LogSink {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            logs_dir: working_dir.join("logs"),
        }
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.logs_dir)
    }

    /// Build the rotating writer for `runner.log`. The returned writer
    /// should be installed as a `tracing_subscriber::fmt` layer's writer by
    /// the caller (kept separate from subscriber init so tests can exercise
    /// rotation without installing a global subscriber).
    pub fn runner_log_writer(&self) -> std::io::Result<SizeRotatingWriter> {
        self.ensure_dir()?;
        SizeRotatingWriter::new(
            self.logs_dir.join("runner.log"),
            RUNNER_LOG_MAX_BYTES,
            RUNNER_LOG_BACKUP_COUNT,
        )
    }

    /// Truncate `errors.log` (Runner startup, spec §5 "stderr of Runner...
    /// truncate-on-start").
    pub fn truncate_errors_log(&self) -> std::io::Result<()> {
        self.ensure_dir()?;
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.logs_dir.join("errors.log"))?;
        Ok(())
    }

    /// Append a line to `errors.log` (used by the outer retry-on-error
    /// branch and by tool-dispatch error paths).
    pub fn write_error(&self, message: &str) -> std::io::Result<()> {
        self.append_timestamped("errors.log", message)
    }

    /// Append `<STATUS> <UTC-ISO8601> <branch>\n` to `bootstrap.log`
    /// (ground: `logger_out.bootstrap`, spec §3 "Bootstrap log").
    pub fn log_bootstrap(&self, status: &str, branch: &str) -> std::io::Result<()> {
        self.ensure_dir()?;
        let timestamp = af_fs::format_utc_timestamp();
        let line = format!("{status} {timestamp} {branch}\n");
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.logs_dir.join("bootstrap.log"))?;
        f.write_all(line.as_bytes())
    }

    /// Append a `[local-timestamp] message\n` line to `watcher.log` and
    /// also print it to stdout (ground: `Watcher.log`).
    pub fn log_watcher(&self, message: &str) -> std::io::Result<()> {
        let timestamp = af_fs::format_local_timestamp();
        let line = format!("[{timestamp}] {message}\n");
        print!("{line}");
        self.ensure_dir()?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.logs_dir.join("watcher.log"))?;
        f.write_all(line.as_bytes())
    }

    /// Append a JSON record `{timestamp, direction, data}` to `model.log`
    /// (ground: `logger_out.model`, spec §6 "Model log line").
    pub fn log_model(&self, direction: &str, data: Value) -> std::io::Result<()> {
        self.ensure_dir()?;
        let entry = serde_json::json!({
            "timestamp": af_fs::format_utc_timestamp(),
            "direction": direction,
            "data": data,
        });
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.logs_dir.join("model.log"))?;
        writeln!(f, "{entry}")
    }

    /// Append a timestamped line to `contracts.log` (ground:
    /// `agent.py`'s `log_to_file(logs_dir() / "contracts.log", ...)`).
    pub fn log_contracts(&self, message: &str) -> std::io::Result<()> {
        self.append_timestamped("contracts.log", message)
    }

    fn append_timestamped(&self, filename: &str, message: &str) -> std::io::Result<()> {
        self.ensure_dir()?;
        let timestamp = af_fs::format_utc_timestamp();
        let line = format!("[{timestamp}] {message}\n");
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.logs_dir.join(filename))?;
        f.write_all(line.as_bytes())
    }
}

/// Read `bootstrap.log` and determine whether the most recent bootstrap
/// succeeded: a `SUCCESS` line exists after the last `BOOTSTRAPPING` line
/// (ground: `Watcher.check_bootstrap_success`, spec §3).
pub fn check_bootstrap_success(logs_dir: &Path) -> bool {
    let path = logs_dir.join("bootstrap.log");
    let Ok(content) = std::fs::read_to_string(&path) else {
        return false;
    };
    let lines: Vec<&str> = content.lines().collect();
    let Some(last_bootstrapping) = lines.iter().rposition(|l| l.starts_with("BOOTSTRAPPING")) else {
        return false;
    };
    lines[last_bootstrapping + 1..]
        .iter()
        .any(|l| l.starts_with("SUCCESS"))
}

/// Whether `logs/bootstrapping` exists and is fresher than `grace`
/// (spec §3 "Bootstrap marker", §4.5 "handle_missing" step 1).
pub fn bootstrap_marker_fresh(logs_dir: &Path, grace: std::time::Duration) -> bool {
    let marker = logs_dir.join("bootstrapping");
    let Ok(meta) = std::fs::metadata(&marker) else {
        return false;
    };
    let Ok(modified) = meta.modified() else {
        return false;
    };
    match modified.elapsed() {
        Ok(age) => age <= grace,
        Err(_) => true, // mtime in the future: treat as fresh.
    }
}

/// Touch the zero-byte bootstrap marker (spec §4.3 step 1).
pub fn touch_bootstrap_marker(logs_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(logs_dir)?;
    OpenOptions::new()
        .create(true)
        .write(true)
        .open(logs_dir.join("bootstrapping"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_success_requires_success_after_last_bootstrapping() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir_all(&logs).unwrap();
        std::fs::write(
            logs.join("bootstrap.log"),
            "BOOTSTRAPPING 2026-01-01T00:00:00Z main\nSUCCESS 2026-01-01T00:00:05Z main\n",
        )
        .unwrap();
        assert!(check_bootstrap_success(&logs));
    }

    #[test]
    fn bootstrap_failure_without_trailing_success() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir_all(&logs).unwrap();
        std::fs::write(
            logs.join("bootstrap.log"),
            "SUCCESS 2026-01-01T00:00:00Z main\nBOOTSTRAPPING 2026-01-01T00:00:05Z feat\n",
        )
        .unwrap();
        assert!(!check_bootstrap_success(&logs));
    }

    #[test]
    fn missing_bootstrap_log_is_not_success() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!check_bootstrap_success(&dir.path().join("logs")));
    }

    #[test]
    fn marker_absent_is_not_fresh() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!bootstrap_marker_fresh(dir.path(), std::time::Duration::from_secs(60)));
    }

    #[test]
    fn marker_fresh_immediately_after_touch() {
        let dir = tempfile::tempdir().unwrap();
        touch_bootstrap_marker(dir.path()).unwrap();
        assert!(bootstrap_marker_fresh(dir.path(), std::time::Duration::from_secs(60)));
    }

    #[test]
    fn model_log_writes_json_line() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::new(dir.path());
        sink.log_model("request", serde_json::json!({"model": "x"})).unwrap();
        let content = std::fs::read_to_string(dir.path().join("logs/model.log")).unwrap();
        let parsed: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(parsed["direction"], "request");
    }

    #[test]
    fn truncate_errors_log_clears_content() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::new(dir.path());
        sink.write_error("boom").unwrap();
        sink.truncate_errors_log().unwrap();
        let content = std::fs::read_to_string(dir.path().join("logs/errors.log")).unwrap();
        assert_eq!(content, "");
    }
}
