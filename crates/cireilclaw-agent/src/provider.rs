//! The provider seam: a single OpenAI-compatible Chat Completions contract.
//! `EngineConfig` only ever resolves to `{apiBase, apiKey, model}`, so there
//! is exactly one `LlmProvider` implementation
//! ([`crate::client::OpenAiCompatClient`]) rather than a router choosing
//! between several.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Tool definition sent to the model, derived from a tool's input validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A tool call extracted from the model's response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Whether the model must emit a tool call. The engine defaults to
/// `Required`; `Auto` plus an extra coercion message is substituted only for
/// the Kimi 2.5 workaround.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    Required,
    Auto,
}

/// Request to the provider. `messages` are pre-built in the provider's native
/// shape (user/assistant/tool/system translation) by the turn engine —
/// there is no second message dialect to convert between since this crate
/// talks to exactly one wire format.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<serde_json::Value>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
}

/// Response from the provider (non-streaming; has no streaming surface).
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    /// Canonical finish reason: `"tool_calls"`, `"content_filter"`, or
    /// anything else the engine treats as `UnexpectedFinish`.
    pub finish_reason: String,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("response parse error: {0}")]
    Parse(String),
}
