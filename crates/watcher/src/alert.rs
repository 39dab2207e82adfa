//! PM alert: append a `**WATCHER ALERT**` block to `COMMS.md` and push it,
//! best-effort (ground: `watcher.py::alert_pm`).

use std::path::Path;

/// Append the alert block to `<main_dir>/COMMS.md` and stage/commit/push it
/// to `origin/main` with `check=false` semantics (spec §4.6 step 2: push
/// failure is logged but not fatal).
pub fn alert_pm(main_dir: &Path, message: &str) {
    let comms_path = main_dir.join("COMMS.md");
    let timestamp = af_fs::format_local_timestamp();
    let existing = af_fs::load_file_content(&comms_path, "");
    let alert_text = format!("\n\n---\n**WATCHER ALERT** ({timestamp}):\n{message}\n");

    if let Err(e) = std::fs::write(&comms_path, format!("{existing}{alert_text}")) {
        tracing::error!(error = %e, "failed to write COMMS.md alert");
        return;
    }

    let commit_message = format!("WATCHER ALERT: {}", truncate(message, 50));
    af_git::run_best_effort(&["add", "COMMS.md"], main_dir);
    af_git::run_best_effort(&["commit", "-m", &commit_message], main_dir);
    af_git::run_best_effort(&["push", "origin", "main"], main_dir);
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
