//! Trade Agent
//!
//! Composition root for one decision: binds the portfolio into the tool
//! catalog, runs the tool-calling session, clamps the decision, and records it.

use std::sync::Arc;

use agent_core::{
    LlmProvider, ToolRegistry,
    message::Conversation,
    session::{SessionConfig, ToolCallingSession},
};
use serde_json::json;

use crate::TRADAGENT_PROMPT;
use crate::error::Result;
use crate::features::FeatureEngineer;
use crate::market::MarketDataGateway;
use crate::memory::DecisionStore;
use crate::model::{Decision, DecisionRecord, PortfolioState, TickerDecision, normalize_ticker};
use crate::policy::DecisionPolicy;
use crate::svckit::{AdvisorTool, PriceHistoryTool};

/// Full account of one invocation
#[derive(Clone, Debug)]
pub struct AgentRun {
    pub ticker: String,

    /// Decision after the policy clamp, as persisted
    pub decision: Decision,

    /// The model's decision before the clamp
    pub raw_decision: Decision,

    pub record: DecisionRecord,
    pub tool_rounds: usize,
    pub conversation: Conversation,
}

impl From<AgentRun> for TickerDecision {
    fn from(run: AgentRun) -> Self {
        Self {
            ticker: run.ticker,
            decision: run.decision,
        }
    }
}

pub struct TradeAgent {
    provider: Arc<dyn LlmProvider>,
    market: Arc<dyn MarketDataGateway>,
    memory: Arc<dyn DecisionStore>,
    features: FeatureEngineer,
    policy: DecisionPolicy,
    session: SessionConfig,
}

impl TradeAgent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        market: Arc<dyn MarketDataGateway>,
        memory: Arc<dyn DecisionStore>,
        session: SessionConfig,
    ) -> Self {
        Self {
            provider,
            market,
            memory,
            features: FeatureEngineer::new(),
            policy: DecisionPolicy::new(),
            session,
        }
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }

    /// Model identifier sent with every request
    pub fn model(&self) -> &str {
        &self.session.generation.model
    }

    pub fn memory(&self) -> &dyn DecisionStore {
        self.memory.as_ref()
    }

    pub fn market(&self) -> &dyn MarketDataGateway {
        self.market.as_ref()
    }

    /// Produce, clamp, and record one decision for `ticker`
    pub async fn run(&self, ticker: &str, portfolio: &PortfolioState) -> Result<TickerDecision> {
        self.run_detailed(ticker, portfolio).await.map(Into::into)
    }

    /// Like [`run`](Self::run), also returning the transcript and stored record
    pub async fn run_detailed(&self, ticker: &str, portfolio: &PortfolioState) -> Result<AgentRun> {
        let ticker = normalize_ticker(ticker)?;
        portfolio.validate()?;
        let portfolio = portfolio.normalized()?;

        self.memory.init()?;

        let tools = ToolRegistry::<AdvisorTool>::builder()
            .register(
                AdvisorTool::GetPriceHistory,
                PriceHistoryTool::new(
                    Arc::clone(&self.market),
                    Arc::clone(&self.memory),
                    self.features,
                    portfolio,
                ),
            )
            .build()?;

        tracing::info!(
            %ticker,
            provider = self.provider.name(),
            model = %self.session.generation.model,
            "Starting decision session"
        );

        let mut session = ToolCallingSession::new(self.provider.as_ref(), &tools, &self.session);
        let outcome = session
            .run::<Decision>(TRADAGENT_PROMPT, &json!({ "ticker": ticker }))
            .await?;

        let decision = self.policy.apply(&outcome.output);
        let record = self.memory.save_decision(&ticker, &decision).inspect_err(|e| {
            tracing::error!(%ticker, store = self.memory.name(), error = %e, "Decision computed but not recorded");
        })?;

        tracing::info!(
            %ticker,
            action = %decision.action,
            target_weight = decision.target_weight,
            confidence = decision.confidence,
            record_id = record.id,
            tool_rounds = outcome.tool_rounds,
            "Decision recorded"
        );

        Ok(AgentRun {
            ticker,
            decision,
            raw_decision: outcome.output,
            record,
            tool_rounds: outcome.tool_rounds,
            conversation: outcome.conversation,
        })
    }

    /// Recent decisions for a ticker, newest first
    pub fn history(&self, ticker: &str, limit: usize) -> Result<Vec<DecisionRecord>> {
        let ticker = normalize_ticker(ticker)?;
        self.memory.init()?;
        self.memory.recent_decisions(&ticker, limit)
    }
}
