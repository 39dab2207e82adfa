//! PID file for the Runner, so the Watcher's pidfile fallback
//! (`af_watcher::process::find_runner_via_pidfile`) has something to read
//! when the argv scan can't see the process (ground: teacher's
//! `cli/pid.rs`, generalized from exclusive-lock-guards-a-daemon to
//! write-once-best-effort since only the Watcher ever reads this file —
//! there is no second Runner to exclude).

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use fs2::FileExt;

/// Write the current PID to `<main>/logs/runner.pid` and hold an exclusive
/// `fs2` lock on it for the process lifetime. Unlike the teacher's daemon
/// guard, a lock conflict here is not fatal to startup — `af_domain::Error`
/// is a catchable transient-cycle error per spec §7, and a stale lock from
/// a killed predecessor should not block recovery — so this logs and
/// returns `None` on conflict rather than erroring.
pub fn write_pid_file(path: &Path) -> std::io::Result<Option<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .read(true)
        .open(path)?;

    if file.try_lock_exclusive().is_err() {
        tracing::warn!(path = %path.display(), "PID file already locked, not writing");
        return Ok(None);
    }

    writeln!(&file, "{}", std::process::id())?;
    file.flush()?;
    Ok(Some(file))
}

/// Remove the PID file; the lock releases when `handle` drops.
pub fn remove_pid_file(path: &Path, _handle: File) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_own_pid_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/runner.pid");
        let handle = write_pid_file(&path).unwrap().unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim().parse::<u32>().unwrap(), std::process::id());
        remove_pid_file(&path, handle);
        assert!(!path.exists());
    }

    #[test]
    fn second_lock_attempt_yields_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.pid");
        let _first = write_pid_file(&path).unwrap().unwrap();
        let second = write_pid_file(&path).unwrap();
        assert!(second.is_none());
    }
}
