//! Error Types for the Trade Advisor

use std::time::Duration;

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Insufficient data: need at least {required} closes, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("No data returned for ticker={ticker} period={period} interval={interval}")]
    NoData {
        ticker: String,
        period: String,
        interval: String,
    },

    #[error("Invalid price history: {0}")]
    InvalidPriceHistory(String),

    #[error("Invalid portfolio: {0}")]
    InvalidPortfolio(String),

    #[error("Invalid ticker: {0:?}")]
    InvalidTicker(String),

    #[error("Model requested unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Model exceeded the tool round cap of {0}")]
    ToolLoopExceeded(usize),

    #[error("Decision failed schema validation: {0}")]
    SchemaValidation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Timed out during {stage} after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    #[error("Market data error: {0}")]
    Market(String),

    #[error("Model session failed: {0}")]
    Model(#[source] AgentError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse grouping callers use to tell failure sources apart
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad market data or bad caller input
    BadInput,
    /// The model broke the protocol or the output contract
    ModelMisbehavior,
    /// Model API or market data provider unreachable
    Upstream,
    /// Decision memory failed
    Storage,
    Timeout,
    Config,
}

impl AdvisorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InsufficientData { .. }
            | Self::NoData { .. }
            | Self::InvalidPriceHistory(_)
            | Self::InvalidPortfolio(_)
            | Self::InvalidTicker(_) => ErrorCategory::BadInput,
            Self::UnknownTool(_) | Self::ToolLoopExceeded(_) | Self::SchemaValidation(_) => {
                ErrorCategory::ModelMisbehavior
            }
            Self::Model(inner) if inner.is_model_misbehavior() => ErrorCategory::ModelMisbehavior,
            Self::Model(_) | Self::Market(_) => ErrorCategory::Upstream,
            Self::Persistence(_) => ErrorCategory::Storage,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Config(_) | Self::Serialization(_) => ErrorCategory::Config,
        }
    }

    /// Wrap a domain failure so it can cross the tool boundary
    pub(crate) fn into_tool_failure(self, tool: &str) -> AgentError {
        AgentError::ToolExecution {
            tool: tool.to_string(),
            source: Box::new(self),
        }
    }
}

impl From<AgentError> for AdvisorError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::UnknownTool(name) => Self::UnknownTool(name),
            AgentError::ToolLoopExceeded(max) => Self::ToolLoopExceeded(max),
            AgentError::SchemaValidation(msg) => Self::SchemaValidation(msg),
            AgentError::Timeout { stage, after } => Self::Timeout { stage, after },
            AgentError::Config(msg) => Self::Config(msg),
            AgentError::ToolExecution { tool, source } => match source.downcast::<AdvisorError>() {
                Ok(domain) => *domain,
                Err(source) => Self::Model(AgentError::ToolExecution { tool, source }),
            },
            other => Self::Model(other),
        }
    }
}
