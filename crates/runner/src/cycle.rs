//! The Runner's work cycle (spec §4.1) and tool-call sub-loop (spec §4.2).
//!
//! Takes a `&dyn ChatBackend` rather than a concrete `af_providers::ChatClient`
//! so both can be exercised in tests against a scripted fake backend without
//! a network call (ground: teacher's `providers::traits::LlmProvider`
//! consumers).

use af_domain::config::RunnerConfig;
use af_domain::wire::{ChatCompletionRequest, Message, ToolCall};
use af_logging::LogSink;
use af_providers::ChatBackend;
use af_tools::ToolDispatcher;
use sha2::{Digest, Sha256};

/// Result of one `run_cycle` call, for logging and tests.
#[derive(Debug, PartialEq, Eq)]
pub struct CycleOutcome {
    /// `false` if the cycle was skipped because `COMMS.md` was unchanged.
    pub ran: bool,
    /// Number of chat-completion requests sent (1 for a no-tool-call
    /// cycle, more if the tool-call sub-loop iterated).
    pub requests_sent: usize,
}

/// SHA-256 hex digest of `COMMS.md`, or `None` if the file is missing
/// (spec §4.1 step 2).
fn comms_hash(working_dir: &std::path::Path) -> Option<String> {
    let content = std::fs::read(working_dir.join("COMMS.md")).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Some(format!("{:x}", hasher.finalize()))
}

/// Run one work cycle (spec §4.1 steps 1-8).
pub async fn run_cycle(
    cfg: &RunnerConfig,
    dispatcher: &ToolDispatcher,
    client: &dyn ChatBackend,
    sink: &LogSink,
    last_comms_hash: &mut Option<String>,
) -> af_domain::Result<CycleOutcome> {
    // Step 1: fast-forward pull, ignore failure.
    af_git::run_best_effort(&["pull", "--ff-only"], &cfg.working_dir);

    // Step 2 + 3: hash COMMS.md, skip if unchanged.
    let hash = comms_hash(&cfg.working_dir);
    if hash.is_some() && hash == *last_comms_hash {
        tracing::info!("COMMS.md unchanged, skipping cycle");
        return Ok(CycleOutcome {
            ran: false,
            requests_sent: 0,
        });
    }

    // Step 4 + 5: system prompt + initial conversation.
    let system_prompt = crate::prompt::build_system_prompt(&cfg.working_dir);
    let mut messages = vec![Message::system(system_prompt), Message::user("Continue.")];

    // Step 6: first request.
    let mut requests_sent = 0usize;
    let response = send_request(cfg, dispatcher, client, sink, &messages, &mut requests_sent).await?;

    let Some(assistant_message) = response.message() else {
        *last_comms_hash = hash;
        return Ok(CycleOutcome {
            ran: true,
            requests_sent,
        });
    };

    let tool_calls = assistant_message.tool_calls.clone().unwrap_or_default();
    messages.push(assistant_message);

    if !tool_calls.is_empty() {
        run_tool_loop(cfg, dispatcher, client, sink, &mut messages, tool_calls, &mut requests_sent).await?;
    }

    // Steps 7/8: record last_comms_hash whichever path was taken.
    *last_comms_hash = hash;
    Ok(CycleOutcome {
        ran: true,
        requests_sent,
    })
}

/// Tool-call sub-loop (spec §4.2). `tool_calls` is the first round; the
/// loop re-issues requests until a response carries none, or the defensive
/// iteration cap (`RunnerConfig::MAX_TOOL_LOOP_ITERATIONS`) is reached.
async fn run_tool_loop(
    cfg: &RunnerConfig,
    dispatcher: &ToolDispatcher,
    client: &dyn ChatBackend,
    sink: &LogSink,
    messages: &mut Vec<Message>,
    mut tool_calls: Vec<ToolCall>,
    requests_sent: &mut usize,
) -> af_domain::Result<()> {
    for _iteration in 0..RunnerConfig::MAX_TOOL_LOOP_ITERATIONS {
        // Step 1: dispatch each call, form a tool-result message per call.
        for call in &tool_calls {
            let args = if call.function.arguments.is_empty() {
                "{}"
            } else {
                call.function.arguments.as_str()
            };
            let output = dispatcher.execute(&call.function.name, args).await;
            let _ = sink.log_model(
                "tool_result",
                serde_json::json!({"tool": call.function.name, "output": output}),
            );
            messages.push(Message::tool_result(call.id.clone(), output));
        }

        // Steps 2 + 3: conversation already appended above; re-issue.
        let response = send_request(cfg, dispatcher, client, sink, messages, requests_sent).await?;
        let Some(assistant_message) = response.message() else {
            return Ok(());
        };

        let next_calls = assistant_message.tool_calls.clone().unwrap_or_default();
        messages.push(assistant_message);

        // Step 4: no tool calls, exit the sub-loop.
        if next_calls.is_empty() {
            return Ok(());
        }
        // Step 5: repeat with the new response's tool calls.
        tool_calls = next_calls;
    }

    tracing::warn!(
        "tool-call sub-loop exceeded {} iterations, returning synthetic error",
        RunnerConfig::MAX_TOOL_LOOP_ITERATIONS
    );
    messages.push(Message::user(
        "Error: tool-call sub-loop exceeded the maximum number of iterations.",
    ));
    Ok(())
}

async fn send_request(
    cfg: &RunnerConfig,
    dispatcher: &ToolDispatcher,
    client: &dyn ChatBackend,
    sink: &LogSink,
    messages: &[Message],
    requests_sent: &mut usize,
) -> af_domain::Result<af_domain::wire::ChatCompletionResponse> {
    let request = ChatCompletionRequest {
        model: cfg.openrouter_model.clone().unwrap_or_default(),
        messages: messages.to_vec(),
        tools: dispatcher.list_schemas(),
        tool_choice: Some("auto".to_string()),
    };
    let _ = sink.log_model("request", serde_json::to_value(&request).unwrap_or_default());

    let response = client.chat(&request).await?;
    *requests_sent += 1;
    let _ = sink.log_model(
        "response",
        serde_json::to_value(&response).unwrap_or_default(),
    );
    Ok(response)
}
