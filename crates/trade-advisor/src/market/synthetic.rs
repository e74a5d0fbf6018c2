//! Synthetic Market Data
//!
//! Deterministic price series for offline runs and tests. Each ticker gets
//! its own seeded random walk; fixed series can be pinned per ticker.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};

use super::MarketDataGateway;
use crate::error::{AdvisorError, Result};
use crate::model::{PriceHistory, PriceHistoryRequest};

#[derive(Clone, Debug, Default)]
pub struct SyntheticMarketData {
    pinned: HashMap<String, Vec<f64>>,
}

impl SyntheticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve exactly `close` for `ticker`; an empty series yields `NoData`
    pub fn with_series(mut self, ticker: impl Into<String>, close: Vec<f64>) -> Self {
        self.pinned.insert(ticker.into(), close);
        self
    }

    /// Bars covered by a Yahoo-style period at a given interval
    fn bar_count(period: &str, interval: &str) -> Option<usize> {
        let days: usize = match period {
            "1d" => 1,
            "5d" => 5,
            "1mo" => 21,
            "3mo" => 63,
            "6mo" => 126,
            "1y" | "ytd" => 252,
            "2y" => 504,
            "5y" => 1260,
            "10y" | "max" => 2520,
            _ => return None,
        };
        match interval {
            "1d" => Some(days),
            "1h" | "60m" => Some(days * 7),
            "1wk" => Some(days.div_ceil(5)),
            "1mo" => Some(days.div_ceil(21)),
            _ => None,
        }
    }

    fn step(interval: &str) -> Duration {
        match interval {
            "1h" | "60m" => Duration::hours(1),
            "1wk" => Duration::weeks(1),
            "1mo" => Duration::days(30),
            _ => Duration::days(1),
        }
    }

    /// Seeded random walk starting at 100
    fn random_walk(ticker: &str, bars: usize) -> Vec<f64> {
        let mut state = ticker
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3));
        let mut price = 100.0;
        (0..bars)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                #[allow(clippy::cast_precision_loss)]
                let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
                price *= 1.0 + 0.0003 + (unit - 0.5) * 0.04;
                price
            })
            .collect()
    }
}

#[async_trait]
impl MarketDataGateway for SyntheticMarketData {
    async fn fetch(&self, request: &PriceHistoryRequest) -> Result<PriceHistory> {
        let close = match self.pinned.get(&request.ticker) {
            Some(series) => series.clone(),
            None => {
                let bars = Self::bar_count(&request.period, &request.interval).ok_or_else(|| {
                    AdvisorError::Market(format!(
                        "unsupported period/interval {}/{}",
                        request.period, request.interval
                    ))
                })?;
                Self::random_walk(&request.ticker, bars)
            }
        };

        if close.is_empty() {
            return Err(AdvisorError::NoData {
                ticker: request.ticker.clone(),
                period: request.period.clone(),
                interval: request.interval.clone(),
            });
        }

        let anchor: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).single().unwrap_or_default();
        let step = Self::step(&request.interval);
        let timestamps = (0..close.len())
            .scan(anchor, |at, _| {
                let current = *at;
                *at = current + step;
                Some(current.to_rfc3339_opts(SecondsFormat::Secs, false))
            })
            .collect();

        PriceHistory::new(request.ticker.clone(), timestamps, close)
    }

    fn name(&self) -> &str {
        "Synthetic"
    }
}
