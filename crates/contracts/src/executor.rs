//! Bounded ReAct tool loop driving contract execution (ground: `agent.py`'s
//! `Agent._query`, `MAX_TURNS = 30`).

use std::path::{Path, PathBuf};

use af_domain::wire::{ChatCompletionRequest, Message};
use af_providers::ChatClient;

use crate::contract::Contract;
use crate::policy::ToolPolicy;

pub const MAX_TURNS: usize = 30;

/// Substrings recognized as an expired/invalid credential (ground: spec §7
/// "Auth/token expired"; the exact vendor exception text isn't visible in
/// this port, see the Open Question decision recorded alongside this
/// crate — case-insensitive).
const TOKEN_EXPIRED_PHRASES: &[&str] = &[
    "invalid api key",
    "unauthorized",
    "token expired",
    "authentication_error",
];

fn looks_like_token_expired(message: &str) -> bool {
    let lower = message.to_lowercase();
    TOKEN_EXPIRED_PHRASES.iter().any(|p| lower.contains(p))
}

pub struct ContractsExecutor {
    policy: ToolPolicy,
    client: ChatClient,
    model: String,
    system_prompt: String,
    sink: af_logging::LogSink,
    working_dir: PathBuf,
}

impl ContractsExecutor {
    pub fn new(
        policy: ToolPolicy,
        client: ChatClient,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        sink: af_logging::LogSink,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            policy,
            client,
            model: model.into(),
            system_prompt: system_prompt.into(),
            sink,
            working_dir,
        }
    }

    /// Build the combined system prompt from `CONTRACTOR.md` + `CODING.md`
    /// (ground: `Agent._build_system_prompt`'s `"\n\n---\n\n"` join).
    pub fn load_system_prompt(prompts_dir: &Path) -> String {
        let contractor = af_fs::load_file_content(&prompts_dir.join("CONTRACTOR.md"), "");
        let coding = af_fs::load_file_content(&prompts_dir.join("CODING.md"), "");
        format!("{}\n\n---\n\n{}", contractor.trim(), coding.trim())
    }

    /// Run one contract through the bounded tool loop, moving it into
    /// `contracts_completed/` on success (ground: `Contracts.execute`).
    pub async fn execute_one(&self, contract: &Contract) -> String {
        tracing::info!(title = %contract.title, "executing contract");

        let mut messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(contract.prompt()),
        ];

        let mut last_content = "no content".to_string();

        for _turn in 0..MAX_TURNS {
            let request = ChatCompletionRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                tools: self.policy.list_schemas(),
                tool_choice: Some("auto".to_string()),
            };

            let _ = self
                .sink
                .log_model("request", serde_json::to_value(&request).unwrap_or_default());

            let response = match self.client.chat(&request).await {
                Ok(r) => r,
                Err(e) => {
                    let message = e.to_string();
                    if looks_like_token_expired(&message) {
                        self.write_token_expired(&message);
                    }
                    let _ = self.sink.write_error(&format!(
                        "Contract failed: {} — {message}",
                        contract.title
                    ));
                    return format!("failed: {} — {message}", contract.title);
                }
            };

            let Some(assistant_message) = response.message() else {
                return format!("failed: {} — empty response", contract.title);
            };

            if let Some(content) = &assistant_message.content {
                if !content.is_empty() {
                    last_content = content.clone();
                    let _ = self
                        .sink
                        .log_contracts(&format!("[{}] {last_content}", contract.title));
                }
            }

            let Some(tool_calls) = assistant_message.tool_calls.clone() else {
                messages.push(assistant_message);
                break;
            };
            if tool_calls.is_empty() {
                messages.push(assistant_message);
                break;
            }

            messages.push(assistant_message);
            for call in &tool_calls {
                let output = self
                    .policy
                    .execute(&call.function.name, &call.function.arguments)
                    .await;
                let _ = self.sink.log_model(
                    "tool_result",
                    serde_json::json!({"tool": call.function.name, "output": output}),
                );
                messages.push(Message::tool_result(call.id.clone(), output));
            }
        }

        match std::fs::create_dir_all(self.working_dir.join("contracts_completed"))
            .and_then(|_| {
                std::fs::rename(
                    &contract.path,
                    self.working_dir
                        .join("contracts_completed")
                        .join(contract.path.file_name().unwrap_or_default()),
                )
            }) {
            Ok(()) => format!("completed: {}\nsummary: {last_content}", contract.title),
            Err(e) => format!("failed: {} — could not move file: {e}", contract.title),
        }
    }

    /// Run every currently-pending contract in `contracts_dir` (ground:
    /// `Contracts.execute_all`).
    pub async fn execute_all(&self, contracts_dir: &Path) -> std::io::Result<String> {
        let pending = crate::contract::find_pending(contracts_dir)?;
        if pending.is_empty() {
            return Ok("No pending contracts found.".to_string());
        }

        let mut results = Vec::with_capacity(pending.len());
        for contract in &pending {
            results.push(self.execute_one(contract).await);
        }

        let mut summary = format!("Executed {} contract(s):\n", results.len());
        summary.push_str(
            &results
                .iter()
                .map(|r| format!("- {r}"))
                .collect::<Vec<_>>()
                .join("\n"),
        );
        Ok(summary)
    }

    fn write_token_expired(&self, message: &str) {
        let path = self.working_dir.join("TOKEN_EXPIRED.txt");
        let body = format!(
            "Authentication failure detected in contracts sub-agent.\n\
             Reason: {message}\n\
             Remediation: refresh the OpenRouter API key (OPENROUTER_API_KEY) \
             and restart the Runner.\n"
        );
        if let Err(e) = std::fs::write(&path, body) {
            tracing::error!(error = %e, "failed to write TOKEN_EXPIRED.txt");
        }
        tracing::error!("=== TOKEN EXPIRED: {message} ===");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_expired_phrases_match_case_insensitively() {
        assert!(looks_like_token_expired("Error: Unauthorized request"));
        assert!(looks_like_token_expired("TOKEN EXPIRED, please refresh"));
        assert!(!looks_like_token_expired("connection reset by peer"));
    }

    #[test]
    fn system_prompt_joins_with_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("CONTRACTOR.md"), "be a contractor").unwrap();
        std::fs::write(dir.path().join("CODING.md"), "write good code").unwrap();
        let prompt = ContractsExecutor::load_system_prompt(dir.path());
        assert_eq!(prompt, "be a contractor\n\n---\n\nwrite good code");
    }
}
