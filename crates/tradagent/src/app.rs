//! Component wiring

use std::sync::Arc;

use clap::ValueEnum;

use agent_core::LlmProvider;
use agent_runtime::{ChatCompletionsConfig, ChatCompletionsProvider};
use trade_advisor::{
    MarketDataGateway, SqliteDecisionStore, SyntheticMarketData, TradagentConfig, TradeAgent, YahooMarketData,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// Hosted Mistral chat completions
    Mistral,
    /// Local Ollama through its OpenAI-compatible endpoint
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MarketKind {
    /// Yahoo Finance chart API
    Yahoo,
    /// Deterministic offline series
    Synthetic,
}

/// Which concrete collaborators to wire in
#[derive(Clone, Debug)]
pub struct Backends {
    pub provider: ProviderKind,
    pub market: MarketKind,
    pub ollama_host: String,
    pub ollama_port: u16,
}

pub fn provider_config(config: &TradagentConfig, backends: &Backends) -> anyhow::Result<ChatCompletionsConfig> {
    let timeout_secs = config.model_timeout.as_secs();
    Ok(match backends.provider {
        ProviderKind::Mistral => ChatCompletionsConfig {
            base_url: config.api_base.clone(),
            timeout_secs,
            ..ChatCompletionsConfig::mistral(config.require_api_key()?)
        },
        ProviderKind::Ollama => ChatCompletionsConfig {
            timeout_secs,
            ..ChatCompletionsConfig::ollama(backends.ollama_host.as_str(), backends.ollama_port)
        },
    })
}

pub fn open_memory(config: &TradagentConfig) -> anyhow::Result<SqliteDecisionStore> {
    Ok(SqliteDecisionStore::open(&config.db_path, config.db_busy_timeout)?)
}

pub fn build_agent(config: &TradagentConfig, backends: &Backends) -> anyhow::Result<TradeAgent> {
    let provider: Arc<dyn LlmProvider> =
        Arc::new(ChatCompletionsProvider::from_config(provider_config(config, backends)?)?);

    let market: Arc<dyn MarketDataGateway> = match backends.market {
        MarketKind::Yahoo => Arc::new(YahooMarketData::new(config.tool_timeout)?),
        MarketKind::Synthetic => Arc::new(SyntheticMarketData::new()),
    };

    let memory = Arc::new(open_memory(config)?);

    tracing::debug!(
        provider = provider.name(),
        market = market.name(),
        db_path = %config.db_path,
        "Components wired"
    );

    Ok(TradeAgent::new(provider, market, memory, config.session_config()))
}
