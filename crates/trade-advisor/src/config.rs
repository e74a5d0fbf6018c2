//! Configuration
//!
//! Process-wide settings, read once at startup and passed into constructors.

use std::str::FromStr;
use std::time::Duration;

use agent_core::provider::GenerationOptions;
use agent_core::session::SessionConfig;

use crate::error::{AdvisorError, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct TradagentConfig {
    /// Mistral API key (`MISTRAL_API_KEY`)
    pub api_key: Option<String>,

    /// Model identifier (`MISTRAL_MODEL`)
    pub model: String,

    /// Chat-completions base URL (`TRADAGENT_API_BASE`)
    pub api_base: String,

    /// SQLite path, `:memory:` allowed (`TRADAGENT_DB_PATH`)
    pub db_path: String,

    pub max_tool_rounds: usize,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
    pub db_busy_timeout: Duration,
    pub temperature: f32,
}

impl Default for TradagentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "mistral-small-latest".into(),
            api_base: "https://api.mistral.ai/v1".into(),
            db_path: "./tradagent.db".into(),
            max_tool_rounds: 8,
            model_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
            db_busy_timeout: Duration::from_millis(5000),
            temperature: 0.1,
        }
    }
}

impl TradagentConfig {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            api_key: get("MISTRAL_API_KEY"),
            model: get("MISTRAL_MODEL").unwrap_or(defaults.model),
            api_base: get("TRADAGENT_API_BASE").unwrap_or(defaults.api_base),
            db_path: get("TRADAGENT_DB_PATH").unwrap_or(defaults.db_path),
            max_tool_rounds: parse(&get, "TRADAGENT_MAX_TOOL_ROUNDS")?.unwrap_or(defaults.max_tool_rounds),
            model_timeout: parse(&get, "TRADAGENT_MODEL_TIMEOUT_SECS")?
                .map_or(defaults.model_timeout, Duration::from_secs),
            tool_timeout: parse(&get, "TRADAGENT_TOOL_TIMEOUT_SECS")?
                .map_or(defaults.tool_timeout, Duration::from_secs),
            db_busy_timeout: parse(&get, "TRADAGENT_DB_BUSY_TIMEOUT_MS")?
                .map_or(defaults.db_busy_timeout, Duration::from_millis),
            temperature: parse(&get, "TRADAGENT_TEMPERATURE")?.unwrap_or(defaults.temperature),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tool_rounds == 0 {
            return Err(AdvisorError::Config("max tool rounds must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AdvisorError::Config(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if self.model_timeout.is_zero() || self.tool_timeout.is_zero() {
            return Err(AdvisorError::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }

    /// API key, required for live model calls
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AdvisorError::Config("MISTRAL_API_KEY is not set".into()))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_tool_rounds: self.max_tool_rounds,
            model_timeout: self.model_timeout,
            tool_timeout: self.tool_timeout,
            generation: GenerationOptions {
                model: self.model.clone(),
                temperature: self.temperature,
                ..GenerationOptions::default()
            },
        }
    }
}

fn parse<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| AdvisorError::Config(format!("{key}={raw:?} is invalid: {e}")))
        })
        .transpose()
}
