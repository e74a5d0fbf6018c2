//! Error Types

use std::time::Duration;

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Boxed error raised by a tool handler
pub type ToolFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The model asked for a tool that is not in the catalog
    #[error("Unknown tool requested by model: {0}")]
    UnknownTool(String),

    /// The model kept requesting tools past the round cap
    #[error("Tool loop exceeded: more than {0} tool rounds requested")]
    ToolLoopExceeded(usize),

    /// Tool arguments missing or of the wrong type
    #[error("Invalid arguments for tool '{tool}': {message}")]
    ToolArguments { tool: String, message: String },

    /// Tool handler failed
    #[error("Tool '{tool}' failed: {source}")]
    ToolExecution {
        tool: String,
        #[source]
        source: ToolFailure,
    },

    /// Model returned no content where content is required
    #[error("Empty model response during {0}")]
    EmptyResponse(&'static str),

    /// Final answer failed to parse or violated the output schema
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    /// A blocking stage did not finish in time
    #[error("Timed out during {stage} after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    /// Malformed provider response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Check if error is retryable by an outer caller
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::ProviderUnavailable(_)
                | AgentError::RateLimited(_)
                | AgentError::Timeout { .. }
        )
    }

    /// Whether the model itself broke the protocol
    pub fn is_model_misbehavior(&self) -> bool {
        matches!(
            self,
            AgentError::UnknownTool(_)
                | AgentError::ToolLoopExceeded(_)
                | AgentError::ToolArguments { .. }
                | AgentError::EmptyResponse(_)
                | AgentError::SchemaValidation(_)
                | AgentError::Parse(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            AgentError::ProviderUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            AgentError::RateLimited(_) => "The AI service is rate limiting requests. Please wait a moment.".into(),
            AgentError::Auth(_) => "Authentication with the AI service failed. Please check your API key.".into(),
            AgentError::UnknownTool(name) => format!("The model requested an unknown tool '{name}'."),
            AgentError::ToolLoopExceeded(_) => "The model kept requesting data without reaching a decision.".into(),
            AgentError::ToolExecution { tool, source } => format!("Tool '{tool}' failed: {source}"),
            AgentError::SchemaValidation(_) | AgentError::EmptyResponse(_) => {
                "The model did not return a valid decision.".into()
            }
            AgentError::Timeout { stage, .. } => format!("The request timed out during {stage}."),
            _ => "An unexpected error occurred.".into(),
        }
    }
}
