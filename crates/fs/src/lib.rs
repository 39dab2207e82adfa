//! Filesystem and timestamp helpers (ground: `autofram.filesystem`).

use std::path::{Path, PathBuf};

use chrono::Utc;

pub const UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
pub const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Resolve `path` to an absolute path, using `base` as the reference for
/// relative paths.
pub fn resolve_path(path: &str, base: &Path) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

/// Format the current UTC time, e.g. `2026-07-27T12:00:00Z`.
pub fn format_utc_timestamp() -> String {
    Utc::now().format(UTC_FORMAT).to_string()
}

/// Format the current local time, e.g. `2026-07-27 12:00:00`.
pub fn format_local_timestamp() -> String {
    chrono::Local::now().format(LOCAL_FORMAT).to_string()
}

/// Read a file's content, falling back to `default` if it doesn't exist.
pub fn load_file_content(path: &Path, default: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|_| default.to_string())
}
