//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for chat-completion backends that support tool
//! calling, allowing the session to work with any backend without code changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{CompletionRequest, LlmProvider};
//!
//! let request = CompletionRequest::new(conversation.messages(), &options)
//!     .with_tools(&declarations);
//! let completion = provider.complete(&request).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::message::Message;
use crate::tool::{ToolCall, ToolSchema};

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "mistral-small-latest", "llama3.2")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_temperature() -> f32 { 0.1 }
fn default_max_tokens() -> u32 { 2048 }
fn default_top_p() -> f32 { 1.0 }

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "mistral-small-latest".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
        }
    }
}

/// Named JSON schema the final answer must satisfy
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OutputSchema {
    /// Schema name passed to the provider
    pub name: String,

    /// JSON Schema document
    pub schema: Value,
}

/// One request to the model
#[derive(Clone, Debug)]
pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
    pub options: &'a GenerationOptions,

    /// Tool declarations; empty means tools are not offered
    pub tools: &'a [ToolSchema],

    /// Structured-output constraint, when the provider supports it
    pub response_schema: Option<&'a OutputSchema>,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(messages: &'a [Message], options: &'a GenerationOptions) -> Self {
        Self {
            messages,
            options,
            tools: &[],
            response_schema: None,
        }
    }

    pub fn with_tools(mut self, tools: &'a [ToolSchema]) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_response_schema(mut self, schema: &'a OutputSchema) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text (may be empty when only tools are requested)
    pub content: String,

    /// Tool calls requested by the model, in the order it listed them
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// Plain text answer
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: Some(FinishReason::Stop),
            ..Default::default()
        }
    }

    /// Answer that requests tools
    pub fn tools(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            finish_reason: Some(FinishReason::ToolUse),
            ..Default::default()
        }
    }

    pub fn requests_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

/// What the backend can do natively
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// JSON-schema constrained output
    pub structured_output: bool,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self { structured_output: true }
    }
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The session works exclusively through this interface and treats every
/// response as untrusted input.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "Mistral", "Ollama")
    fn name(&self) -> &str;

    /// Native capabilities of this backend
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }

    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Generate a completion
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion>;
}
