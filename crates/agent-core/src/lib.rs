//! # agent-core
//!
//! Provider-agnostic LLM abstraction, a closed tool catalog, and the
//! tool-calling session that turns a model conversation into one validated,
//! structured answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    ToolCallingSession                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │ State machine│  │ ToolRegistry │  │   LlmProvider      │  │
//! │  │ (bounded)    │──│ (closed enum)│──│   (Strategy)       │  │
//! │  └──────────────┘  └──────────────┘  └────────────────────┘  │
//! │            final answer ──► StructuredOutput (schema)         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Mistral, Ollama, or any
//! other chat-completion backend without changing session logic.

pub mod error;
pub mod message;
pub mod provider;
pub mod scripted;
pub mod session;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{Completion, CompletionRequest, GenerationOptions, LlmProvider, OutputSchema};
pub use session::{SessionConfig, SessionOutcome, SessionState, StructuredOutput, ToolCallingSession};
pub use tool::{Tool, ToolCall, ToolName, ToolRegistry, ToolResult, ToolSchema};
