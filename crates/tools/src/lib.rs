//! Built-in tools and the dispatcher that exposes them to the model
//! (ground: `autofram.tools`).
//!
//! `bootstrap` and `rollback` are registered by the `runner` binary itself
//! (they call into `af-upgrade`, which this crate does not depend on) so
//! that the generic file/shell/search tools here stay reusable by the
//! contracts sub-agent without pulling in process-replacement machinery.

mod builtins;
mod registry;

pub use builtins::ToolContext;
pub use registry::ToolDispatcher;

use std::time::Duration;

/// Build a dispatcher with the generic built-ins registered: `read_file`,
/// `write_file`, `bash`, `web_search` (spec §4.4).
pub fn default_dispatcher(ctx: ToolContext) -> ToolDispatcher {
    let mut dispatcher = ToolDispatcher::new();

    let read_ctx = ctx.clone();
    dispatcher.register(
        "read_file",
        "Read the contents of a file.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to the file to read (relative to working directory or absolute)"}
            },
            "required": ["path"]
        }),
        move |args| {
            let ctx = read_ctx.clone();
            async move { builtins::read_file(&ctx, &args) }
        },
    );

    let write_ctx = ctx.clone();
    dispatcher.register(
        "write_file",
        "Write content to a file, creating directories if needed.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to the file to write (relative to working directory or absolute)"},
                "content": {"type": "string", "description": "The content to write to the file"}
            },
            "required": ["path", "content"]
        }),
        move |args| {
            let ctx = write_ctx.clone();
            async move { builtins::write_file(&ctx, &args) }
        },
    );

    let bash_ctx = ctx.clone();
    dispatcher.register(
        "bash",
        "Execute a shell command and return the output.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "The bash command to execute"}
            },
            "required": ["command"]
        }),
        move |args| {
            let ctx = bash_ctx.clone();
            async move { builtins::bash(&ctx, &args).await }
        },
    );

    dispatcher.register(
        "web_search",
        "Search the web and return trimmed result text.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"}
            },
            "required": ["query"]
        }),
        move |args| async move { builtins::web_search(&args).await },
    );

    dispatcher
}

pub fn default_bash_timeout() -> Duration {
    Duration::from_secs(af_domain::config::RunnerConfig::BASH_TIMEOUT_SECONDS)
}
