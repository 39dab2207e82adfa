//! Built-in tool handlers (ground: `autofram.tools`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use af_domain::error::{Error, Result};
use serde_json::Value;

/// Shared state threaded through every built-in (spec §4.4).
#[derive(Clone)]
pub struct ToolContext {
    pub working_dir: PathBuf,
    pub bash_timeout: Duration,
}

fn arg_str(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Other(format!("missing argument: {key}")))
}

/// Read a file's contents (spec §4.4 "read_file").
///
/// A directory target is distinguished from other read failures so the
/// dispatcher can surface a human-phrased `ls` hint instead of a raw I/O
/// error (spec §4.2 "is-a-directory").
pub fn read_file(ctx: &ToolContext, args: &Value) -> Result<String> {
    let path = arg_str(args, "path")?;
    let resolved = af_fs::resolve_path(&path, &ctx.working_dir);

    if resolved.is_dir() {
        return Err(Error::Other(format!(
            "{path} is a directory, not a file. Use `ls {path}` to see its contents."
        )));
    }
    if !resolved.exists() {
        return Err(Error::Other(format!("FileNotFoundError: {path}")));
    }
    std::fs::read_to_string(&resolved).map_err(|e| Error::Other(format!("{}: {e}", kind_of(&e))))
}

/// Write content to a file, creating parent directories as needed (spec
/// §4.4 "write_file").
pub fn write_file(ctx: &ToolContext, args: &Value) -> Result<String> {
    let path = arg_str(args, "path")?;
    let content = arg_str(args, "content")?;
    let resolved = af_fs::resolve_path(&path, &ctx.working_dir);

    if let Some(parent) = resolved.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&resolved, &content)?;
    Ok(format!(
        "Successfully wrote {} bytes to {path}",
        content.len()
    ))
}

/// Run a shell command, returning combined stdout/stderr and an
/// `[Exit code: N]` suffix on non-zero exit (ground: `format_bash_output`).
pub async fn bash(ctx: &ToolContext, args: &Value) -> Result<String> {
    let command = arg_str(args, "command")?;

    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c")
        .arg(&command)
        .current_dir(&ctx.working_dir)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    let child = cmd
        .spawn()
        .map_err(|e| Error::Other(format!("failed to spawn shell: {e}")))?;

    let output = match tokio::time::timeout(ctx.bash_timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| Error::Other(format!("command failed: {e}")))?,
        Err(_) => {
            return Err(Error::Other(format!(
                "command timed out after {}s",
                ctx.bash_timeout.as_secs()
            )))
        }
    };

    Ok(format_bash_output(
        &String::from_utf8_lossy(&output.stdout),
        &String::from_utf8_lossy(&output.stderr),
        output.status.code().unwrap_or(-1),
    ))
}

fn format_bash_output(stdout: &str, stderr: &str, exit_code: i32) -> String {
    let mut parts = Vec::new();
    if !stdout.is_empty() {
        parts.push(stdout.to_string());
    }
    if !stderr.is_empty() {
        parts.push(stderr.to_string());
    }
    if exit_code != 0 {
        parts.push(format!("[Exit code: {exit_code}]"));
    }
    if parts.is_empty() {
        "[No output]".to_string()
    } else {
        parts.join("\n")
    }
}

/// Fetch a search-results page and return trimmed text (ground: teacher's
/// fetch-and-trim pattern, configurable endpoint since no vendor search API
/// is specified).
pub async fn web_search(args: &Value) -> Result<String> {
    let query = arg_str(args, "query")?;
    let endpoint = std::env::var("AUTOFRAM_WEB_SEARCH_URL")
        .unwrap_or_else(|_| "https://duckduckgo.com/html/".to_string());

    let client = reqwest::Client::new();
    let response = client
        .get(&endpoint)
        .query(&[("q", query.as_str())])
        .send()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    let body = response
        .text()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    Ok(trim_text(&body, 4000))
}

fn trim_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}\n... [truncated]")
    }
}

fn kind_of(err: &std::io::Error) -> &'static str {
    match err.kind() {
        std::io::ErrorKind::NotFound => "FileNotFoundError",
        std::io::ErrorKind::PermissionDenied => "PermissionError",
        _ => "OSError",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(dir: &Path) -> ToolContext {
        ToolContext {
            working_dir: dir.to_path_buf(),
            bash_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn read_file_returns_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let result = read_file(&ctx(dir.path()), &serde_json::json!({"path": "a.txt"})).unwrap();
        assert_eq!(result, "hello");
    }

    #[test]
    fn read_file_missing_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file(&ctx(dir.path()), &serde_json::json!({"path": "missing.txt"}))
            .unwrap_err();
        assert!(err.to_string().contains("FileNotFoundError"));
    }

    #[test]
    fn read_file_on_directory_hints_ls() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let err =
            read_file(&ctx(dir.path()), &serde_json::json!({"path": "sub"})).unwrap_err();
        assert!(err.to_string().contains("ls sub"));
    }

    #[test]
    fn write_file_creates_parents_and_reports_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_file(
            &ctx(dir.path()),
            &serde_json::json!({"path": "nested/out.txt", "content": "abcd"}),
        )
        .unwrap();
        assert!(result.contains("4 bytes"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("nested/out.txt")).unwrap(),
            "abcd"
        );
    }

    #[tokio::test]
    async fn bash_reports_nonzero_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let result = bash(&ctx(dir.path()), &serde_json::json!({"command": "exit 3"}))
            .await
            .unwrap();
        assert_eq!(result, "[Exit code: 3]");
    }

    #[tokio::test]
    async fn bash_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let result = bash(&ctx(dir.path()), &serde_json::json!({"command": "echo hi"}))
            .await
            .unwrap();
        assert_eq!(result, "hi");
    }
}
