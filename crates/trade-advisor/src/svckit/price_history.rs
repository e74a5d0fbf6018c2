//! Price History Tool
//!
//! Fetches price history, computes features, and bundles them with the
//! portfolio weight and recent decisions for the ticker.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolName, ToolResult, ToolSchema,
    error::AgentError,
    tool::ParameterSchema,
};

use super::AdvisorTool;
use crate::error::Result;
use crate::features::FeatureEngineer;
use crate::market::MarketDataGateway;
use crate::memory::DecisionStore;
use crate::model::{
    DEFAULT_INTERVAL, DEFAULT_PERIOD, DecisionRecord, MarketFeatures, PortfolioState, PriceHistory,
    PriceHistoryRequest, normalize_ticker,
};

/// Bars of history included in the payload
pub const HISTORY_TAIL: usize = 180;

/// Past decisions included in the payload
pub const RECENT_DECISIONS: usize = 5;

/// JSON handed back to the model
#[derive(Debug, Serialize)]
pub struct PriceHistoryPayload {
    pub price_history: PriceHistory,
    pub features: MarketFeatures,
    pub portfolio: PortfolioState,
    pub current_weight: f64,
    pub recent_decisions: Vec<DecisionRecord>,
}

/// Handler for `get_price_history`, bound to one invocation's portfolio
pub struct PriceHistoryTool {
    market: Arc<dyn MarketDataGateway>,
    memory: Arc<dyn DecisionStore>,
    features: FeatureEngineer,
    portfolio: PortfolioState,
}

impl PriceHistoryTool {
    pub fn new(
        market: Arc<dyn MarketDataGateway>,
        memory: Arc<dyn DecisionStore>,
        features: FeatureEngineer,
        portfolio: PortfolioState,
    ) -> Self {
        Self {
            market,
            memory,
            features,
            portfolio,
        }
    }

    fn request_from(call: &ToolCall) -> CoreResult<PriceHistoryRequest> {
        let ticker = normalize_ticker(call.required_str("ticker")?).map_err(|e| AgentError::ToolArguments {
            tool: call.name.clone(),
            message: e.to_string(),
        })?;
        let mut request = PriceHistoryRequest::new(ticker);
        if let Some(period) = call.str_arg("period").filter(|p| !p.trim().is_empty()) {
            request = request.with_period(period.trim());
        }
        if let Some(interval) = call.str_arg("interval").filter(|i| !i.trim().is_empty()) {
            request = request.with_interval(interval.trim());
        }
        Ok(request)
    }

    /// Build the payload for one request
    pub async fn payload(&self, request: &PriceHistoryRequest) -> Result<PriceHistoryPayload> {
        let history = self.market.fetch(request).await?;
        let features = self.features.compute(&history)?;
        let recent_decisions = self.memory.recent_decisions(&request.ticker, RECENT_DECISIONS)?;

        Ok(PriceHistoryPayload {
            price_history: history.tail(HISTORY_TAIL),
            features,
            portfolio: self.portfolio.clone(),
            current_weight: self.portfolio.weight_of(&request.ticker),
            recent_decisions,
        })
    }
}

#[async_trait]
impl Tool for PriceHistoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: AdvisorTool::GetPriceHistory.as_str().into(),
            description: "Fetch historical adjusted close prices for a ticker, with computed volatility, \
                          momentum and volatility-regime features, the current portfolio weight, and recent \
                          decisions for that ticker."
                .into(),
            parameters: vec![
                ParameterSchema::string("ticker", "Ticker symbol (e.g., 'AAPL')", true),
                ParameterSchema::string("period", "Lookback span (e.g., '6mo', '1y')", false)
                    .with_default(DEFAULT_PERIOD.into()),
                ParameterSchema::string("interval", "Bar granularity (e.g., '1d', '1h')", false)
                    .with_default(DEFAULT_INTERVAL.into()),
            ],
        }
    }

    fn validate(&self, call: &ToolCall) -> CoreResult<()> {
        Self::request_from(call).map(|_| ())
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let request = Self::request_from(call)?;
        tracing::info!(
            ticker = %request.ticker,
            period = %request.period,
            interval = %request.interval,
            market = self.market.name(),
            "Building price history payload"
        );

        let payload = self
            .payload(&request)
            .await
            .map_err(|e| e.into_tool_failure(&call.name))?;
        let output = serde_json::to_string(&payload)?;

        Ok(ToolResult::new(&call.name, &call.id, output))
    }
}
