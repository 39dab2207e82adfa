//! Git subprocess wrapper (ground: `autofram.git.Git`).

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use af_domain::error::{Error, Result};

/// Default root under which each branch gets its own working copy
/// (`<AGENT_ROOT>/<branch>/autofram`, spec §3). Overridable via
/// `AUTOFRAM_AGENT_ROOT` since the original's `/home/agent` is host-specific.
pub fn agent_root() -> PathBuf {
    std::env::var("AUTOFRAM_AGENT_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/home/agent"))
}

/// The git remote all branch clones are cloned/fetched from. Overridable via
/// `AUTOFRAM_REMOTE_REPO`.
pub fn remote_repo() -> String {
    std::env::var("AUTOFRAM_REMOTE_REPO").unwrap_or_else(|_| "/mnt/remote".to_string())
}

/// The working-copy directory for a given branch:
/// `<AGENT_ROOT>/<branch>/autofram`.
pub fn branch_dir(branch: &str) -> PathBuf {
    agent_root().join(branch).join("autofram")
}

/// Run a git command, optionally checking for success.
///
/// `check = false` mirrors `Git.run(..., check=False)`: non-zero exit is not
/// an error, the caller inspects `Output` directly.
pub fn run(args: &[&str], cwd: &Path, check: bool) -> Result<Output> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| Error::Git(format!("spawning git {args:?}: {e}")))?;

    if check && !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Git(format!(
            "git {args:?} failed: {stderr}"
        )));
    }
    Ok(output)
}

/// Best-effort git invocation: logs failures, never returns an error.
/// Used for the many "check=false" call sites in the original (e.g. fast
/// forward pulls, alert commits).
pub fn run_best_effort(args: &[&str], cwd: &Path) {
    match run(args, cwd, false) {
        Ok(output) if !output.status.success() => {
            tracing::warn!(
                args = ?args,
                cwd = %cwd.display(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "git command exited non-zero"
            );
        }
        Err(e) => {
            tracing::warn!(args = ?args, cwd = %cwd.display(), error = %e, "git command failed to run");
        }
        _ => {}
    }
}

/// Current branch name, empty string on failure (ground:
/// `Git.get_current_branch`, which uses `check=False`).
pub fn current_branch(cwd: &Path) -> String {
    match run(&["rev-parse", "--abbrev-ref", "HEAD"], cwd, false) {
        Ok(output) => String::from_utf8_lossy(&output.stdout).trim().to_string(),
        Err(_) => String::new(),
    }
}

/// Fetch + hard-reset to `origin/<branch>`. Returns `false` on any failure
/// (ground: `Git.sync`).
pub fn sync(cwd: &Path, branch: &str) -> bool {
    if run(&["fetch", "origin"], cwd, true).is_err() {
        return false;
    }
    let target = format!("origin/{branch}");
    run(&["reset", "--hard", &target], cwd, true).is_ok()
}

/// Clone `branch` into `target_dir` if absent, else fetch + checkout +
/// hard-reset in place (ground: `tools.clone_or_update_branch`).
pub fn clone_or_update_branch(branch: &str, target_dir: &Path) -> Result<()> {
    if target_dir.exists() {
        run(&["fetch", "origin"], target_dir, true)?;
        run(&["checkout", branch], target_dir, true)?;
        let target = format!("origin/{branch}");
        run(&["reset", "--hard", &target], target_dir, true)?;
    } else {
        if let Some(parent) = target_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let remote = remote_repo();
        let status = Command::new("git")
            .args(["clone", "-b", branch, &remote, &target_dir.to_string_lossy()])
            .status()
            .map_err(|e| Error::Git(format!("spawning git clone: {e}")))?;
        if !status.success() {
            return Err(Error::Git(format!(
                "git clone -b {branch} {remote} {} failed",
                target_dir.display()
            )));
        }
    }
    Ok(())
}
