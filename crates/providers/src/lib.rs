//! A thin OpenAI-compatible chat-completions client targeting OpenRouter
//! (ground: teacher's `providers::openai_compat`, trimmed to one vendor —
//! the spec treats the LLM provider as an external collaborator, so this
//! crate only needs to speak the wire format, not route across vendors).

use af_domain::error::{Error, Result};
use af_domain::wire::{ChatCompletionRequest, ChatCompletionResponse};

/// Vendor-agnostic seam for "send one chat-completion request". `ChatClient`
/// is the only production implementation; the trait exists so the Runner's
/// cycle and the contracts sub-agent's turn loop can be exercised in tests
/// against a fake backend without a network call (ground: teacher's
/// `providers::traits::LlmProvider`).
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse>;
}

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send one chat-completions request and parse the response.
    ///
    /// HTTP and non-2xx failures are surfaced as `Error::Http` with the
    /// status code and body so the Runner's outer retry loop can log a
    /// useful message (spec §4.1 "On any exception").
    pub async fn chat(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let response = self
            .http
            .post(self.chat_completions_url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Http(format!("HTTP {}: {body}", status.as_u16())));
        }

        serde_json::from_str(&body).map_err(Error::Json)
    }
}

#[async_trait::async_trait]
impl ChatBackend for ChatClient {
    async fn chat(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        ChatClient::chat(self, request).await
    }
}
