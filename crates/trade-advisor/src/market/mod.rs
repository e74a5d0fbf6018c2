//! Market Data Integration
//!
//! Gateways that supply chronological close prices for a ticker.

mod synthetic;
mod yahoo;

pub use synthetic::SyntheticMarketData;
pub use yahoo::YahooMarketData;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{PriceHistory, PriceHistoryRequest};

/// Market data gateway (Strategy pattern)
///
/// An empty series for the requested window is `AdvisorError::NoData`.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    async fn fetch(&self, request: &PriceHistoryRequest) -> Result<PriceHistory>;

    /// Gateway name
    fn name(&self) -> &str;
}
