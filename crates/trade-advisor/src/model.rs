//! Domain Models
//!
//! Core data types for a single trading decision.
//! Cash uses `rust_decimal`; weights, prices and features are `f64` ratios.

use agent_core::provider::OutputSchema;
use agent_core::session::StructuredOutput;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

use crate::error::{AdvisorError, Result};

/// Canonical ticker form: trimmed and upper-cased
pub fn normalize_ticker(raw: &str) -> Result<String> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() || ticker.chars().any(char::is_whitespace) {
        return Err(AdvisorError::InvalidTicker(raw.to_string()));
    }
    Ok(ticker)
}

/// Caller's portfolio for one invocation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    /// Available cash (USD)
    pub cash: Decimal,

    /// Current weight per ticker
    #[serde(default)]
    pub positions: HashMap<String, f64>,
}

impl PortfolioState {
    pub fn new(cash: Decimal, positions: HashMap<String, f64>) -> Result<Self> {
        let portfolio = Self { cash, positions };
        portfolio.validate()?;
        Ok(portfolio)
    }

    /// Weight held in `ticker`, zero when absent
    pub fn weight_of(&self, ticker: &str) -> f64 {
        self.positions.get(ticker).copied().unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cash < Decimal::ZERO {
            return Err(AdvisorError::InvalidPortfolio(format!("cash must be >= 0, got {}", self.cash)));
        }
        if let Some((ticker, weight)) = self.positions.iter().find(|(_, w)| !w.is_finite()) {
            return Err(AdvisorError::InvalidPortfolio(format!("weight for {ticker} is not finite: {weight}")));
        }
        Ok(())
    }

    /// Copy with tickers in canonical form
    pub fn normalized(&self) -> Result<Self> {
        let mut positions = HashMap::with_capacity(self.positions.len());
        for (ticker, weight) in &self.positions {
            *positions.entry(normalize_ticker(ticker)?).or_insert(0.0) += weight;
        }
        Ok(Self {
            cash: self.cash,
            positions,
        })
    }
}

/// Lookup parameters for a price series
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistoryRequest {
    pub ticker: String,

    /// Lookback span (e.g. "6mo", "1y")
    #[serde(default = "default_period")]
    pub period: String,

    /// Bar granularity (e.g. "1d", "1h")
    #[serde(default = "default_interval")]
    pub interval: String,
}

pub const DEFAULT_PERIOD: &str = "6mo";
pub const DEFAULT_INTERVAL: &str = "1d";

fn default_period() -> String {
    DEFAULT_PERIOD.into()
}

fn default_interval() -> String {
    DEFAULT_INTERVAL.into()
}

impl PriceHistoryRequest {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            period: default_period(),
            interval: default_interval(),
        }
    }

    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = period.into();
        self
    }

    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }
}

/// Chronological close prices
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub ticker: String,

    /// ISO-8601 bar timestamps, strictly increasing
    pub timestamps: Vec<String>,

    /// Close price per timestamp
    pub close: Vec<f64>,
}

impl PriceHistory {
    pub fn new(ticker: impl Into<String>, timestamps: Vec<String>, close: Vec<f64>) -> Result<Self> {
        if timestamps.len() != close.len() {
            return Err(AdvisorError::InvalidPriceHistory(format!(
                "{} timestamps but {} closes",
                timestamps.len(),
                close.len()
            )));
        }

        let mut previous: Option<DateTime<Utc>> = None;
        for raw in &timestamps {
            let at = parse_bar_time(raw)
                .ok_or_else(|| AdvisorError::InvalidPriceHistory(format!("unparseable timestamp {raw:?}")))?;
            if previous.is_some_and(|prev| at <= prev) {
                return Err(AdvisorError::InvalidPriceHistory(format!(
                    "timestamps must be strictly increasing, {raw} does not follow its predecessor"
                )));
            }
            previous = Some(at);
        }

        Ok(Self {
            ticker: ticker.into(),
            timestamps,
            close,
        })
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// Most recent `n` bars
    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        Self {
            ticker: self.ticker.clone(),
            timestamps: self.timestamps[start..].to_vec(),
            close: self.close[start..].to_vec(),
        }
    }
}

/// RFC 3339 instant or a bare `YYYY-MM-DD` date (midnight UTC)
fn parse_bar_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Derived market features, recomputed for every request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketFeatures {
    pub ticker: String,
    pub last_close: f64,
    pub volatility_annualized: f64,
    pub momentum_20d: f64,

    /// Short-term over long-term volatility; above 1 means elevated stress
    pub vol_regime: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// The model's trading decision
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Decision {
    pub action: Action,

    /// Target portfolio weight in [0, 1]
    pub target_weight: f64,

    /// Model confidence in [0, 1]
    pub confidence: f64,

    pub rationale: String,
    pub risk_notes: String,
}

pub const DECISION_SCHEMA_NAME: &str = "tradagent_decision";

impl StructuredOutput for Decision {
    fn output_schema() -> OutputSchema {
        OutputSchema {
            name: DECISION_SCHEMA_NAME.into(),
            schema: json!({
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["BUY", "SELL", "HOLD"]},
                    "target_weight": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                    "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                    "rationale": {"type": "string"},
                    "risk_notes": {"type": "string"},
                },
                "required": ["action", "target_weight", "confidence", "rationale", "risk_notes"],
                "additionalProperties": false,
            }),
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        unit_interval("target_weight", self.target_weight)?;
        unit_interval("confidence", self.confidence)
    }
}

fn unit_interval(field: &str, value: f64) -> std::result::Result<(), String> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} must be within [0, 1], got {value}"))
    }
}

/// Persisted decision
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Monotonically increasing sequence id
    pub id: i64,
    pub ts_utc: DateTime<Utc>,
    pub ticker: String,
    pub decision: Decision,
}

/// Result of one agent invocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickerDecision {
    pub ticker: String,
    pub decision: Decision,
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::session::parse_structured;
    use rust_decimal_macros::dec;

    #[test]
    fn test_weight_of_absent_ticker() {
        let portfolio = PortfolioState::new(dec!(1000), HashMap::from([("AAPL".to_string(), 0.1)])).unwrap();
        assert!((portfolio.weight_of("AAPL") - 0.1).abs() < f64::EPSILON);
        assert!(portfolio.weight_of("MSFT").abs() < f64::EPSILON);
    }

    #[test]
    fn test_negative_cash_rejected() {
        let result = PortfolioState::new(dec!(-1), HashMap::new());
        assert!(matches!(result, Err(AdvisorError::InvalidPortfolio(_))));
    }

    #[test]
    fn test_normalized_positions() {
        let portfolio = PortfolioState::new(dec!(0), HashMap::from([(" aapl ".to_string(), 0.05)])).unwrap();
        let normalized = portfolio.normalized().unwrap();
        assert!((normalized.weight_of("AAPL") - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ticker_normalization() {
        assert_eq!(normalize_ticker("  msft ").unwrap(), "MSFT");
        assert!(normalize_ticker("   ").is_err());
        assert!(normalize_ticker("BRK B").is_err());
    }

    #[test]
    fn test_price_history_length_mismatch() {
        let result = PriceHistory::new("AAPL", vec!["2024-01-02T00:00:00+00:00".into()], vec![]);
        assert!(matches!(result, Err(AdvisorError::InvalidPriceHistory(_))));
    }

    #[test]
    fn test_price_history_rejects_non_increasing_timestamps() {
        let backwards = PriceHistory::new(
            "AAPL",
            vec!["2024-01-03".into(), "2024-01-02".into(), "2024-01-02".into()],
            vec![1.0, 2.0, 3.0],
        );
        assert!(matches!(backwards, Err(AdvisorError::InvalidPriceHistory(_))));

        let repeated = PriceHistory::new(
            "AAPL",
            vec!["2024-01-02T00:00:00+00:00".into(), "2024-01-02T00:00:00Z".into()],
            vec![1.0, 1.0],
        );
        assert!(matches!(repeated, Err(AdvisorError::InvalidPriceHistory(_))));

        let garbage = PriceHistory::new("AAPL", vec!["yesterday".into()], vec![1.0]);
        assert!(matches!(garbage, Err(AdvisorError::InvalidPriceHistory(_))));

        let mixed_offsets = PriceHistory::new(
            "AAPL",
            vec!["2024-01-02T09:30:00-05:00".into(), "2024-01-02T15:00:00Z".into()],
            vec![1.0, 2.0],
        );
        assert!(mixed_offsets.is_ok());
    }

    #[test]
    fn test_price_history_tail() {
        let history = PriceHistory::new(
            "AAPL",
            (2..7).map(|d| format!("2024-01-0{d}")).collect(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap();
        let tail = history.tail(2);
        assert_eq!(tail.close, vec![4.0, 5.0]);
        assert_eq!(tail.timestamps, vec!["2024-01-05", "2024-01-06"]);
        assert_eq!(history.tail(50).len(), 5);
    }

    #[test]
    fn test_decision_parses_and_validates() {
        let decision: Decision = parse_structured(
            r#"{"action":"HOLD","target_weight":0.1,"confidence":0.6,"rationale":"flat","risk_notes":"none"}"#,
        )
        .unwrap();
        assert_eq!(decision.action, Action::Hold);

        let out_of_bounds = parse_structured::<Decision>(
            r#"{"action":"BUY","target_weight":1.5,"confidence":0.6,"rationale":"","risk_notes":""}"#,
        );
        assert!(out_of_bounds.is_err());

        let bad_action = parse_structured::<Decision>(
            r#"{"action":"YOLO","target_weight":0.1,"confidence":0.6,"rationale":"","risk_notes":""}"#,
        );
        assert!(bad_action.is_err());

        let extra_field = parse_structured::<Decision>(
            r#"{"action":"HOLD","target_weight":0.1,"confidence":0.6,"rationale":"","risk_notes":"","leverage":3}"#,
        );
        assert!(extra_field.is_err());
    }

    #[test]
    fn test_decision_schema_shape() {
        let schema = Decision::output_schema();
        assert_eq!(schema.name, "tradagent_decision");
        assert_eq!(schema.schema["required"].as_array().unwrap().len(), 5);
        assert_eq!(schema.schema["additionalProperties"], false);
    }
}
