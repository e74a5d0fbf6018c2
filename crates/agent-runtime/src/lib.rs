//! # agent-runtime
//!
//! Runtime providers for the agent system.
//!
//! ## Providers
//!
//! - **Mistral** (default): hosted chat completions with native tool calling
//!   and `json_schema` structured output
//! - **Ollama**: local inference through the OpenAI-compatible `/v1` endpoint
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{ChatCompletionsConfig, ChatCompletionsProvider};
//!
//! let provider = ChatCompletionsProvider::from_config(ChatCompletionsConfig::mistral(api_key))?;
//! let mut session = ToolCallingSession::new(&provider, &registry, &config);
//! ```

pub mod chat_completions;

pub use chat_completions::{ChatCompletionsConfig, ChatCompletionsProvider};

// Re-export core types for convenience
pub use agent_core::{AgentError, LlmProvider, Message, Result, Role, Tool, ToolRegistry};
