//! # trade-advisor
//!
//! Risk-bounded trading-decision agent. A model gathers market features
//! through a tool, returns a structured BUY/SELL/HOLD decision, and every
//! decision is clamped by policy and recorded for future recall.
//!
//! ## Pipeline
//!
//! ```text
//! caller ──► TradeAgent ──► ToolCallingSession ◄──► model
//!                                   │
//!                     get_price_history (tool round)
//!                     ├─ MarketDataGateway ─► PriceHistory
//!                     ├─ FeatureEngineer   ─► MarketFeatures
//!                     └─ DecisionStore     ─► recent decisions
//!                                   │
//!                      Decision ──► DecisionPolicy (cap 0.25)
//!                                   │
//!                                   ▼
//!                      DecisionStore::save_decision ──► caller
//! ```
//!
//! ## Risk Constraints
//!
//! - **Weight cap** - no single ticker above 25% of the portfolio, enforced
//!   mechanically after the model answers
//! - **Volatility regime** - the model is told not to add weight in a high
//!   volatility regime without strong momentum (advisory only)
//! - **No silent defaults** - any failure aborts the invocation with no decision

pub mod agent;
pub mod config;
pub mod error;
pub mod features;
pub mod market;
pub mod memory;
pub mod model;
pub mod policy;
pub mod svckit;

pub use agent::{AgentRun, TradeAgent};
pub use config::TradagentConfig;
pub use error::{AdvisorError, ErrorCategory, Result};
pub use features::FeatureEngineer;
pub use market::{MarketDataGateway, SyntheticMarketData, YahooMarketData};
pub use memory::{DecisionStore, MemoryDecisionStore, SqliteDecisionStore};
pub use model::{Action, Decision, DecisionRecord, MarketFeatures, PortfolioState, PriceHistory, PriceHistoryRequest, TickerDecision};
pub use policy::{DecisionPolicy, MAX_SINGLE_TICKER_WEIGHT};

/// System prompt for the trading decision agent
pub const TRADAGENT_PROMPT: &str = "You are TRADAgent, a trading decision agent. \
You must use the provided tool to fetch market data. \
You will receive portfolio state and computed market features. \
You must output a decision with action BUY, SELL, or HOLD, and a target_weight between 0 and 1. \
Be conservative. Prefer HOLD when uncertain. \
Risk constraints: never set target_weight above 0.25 for a single ticker; \
never increase target_weight when volatility regime is high unless momentum is strong.";
