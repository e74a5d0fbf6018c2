//! Yahoo Finance chart API
//!
//! Fetches adjusted closes from the public v8 chart endpoint. Bars with a
//! missing close are skipped.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, TimeZone, Utc};
use serde::Deserialize;

use super::MarketDataGateway;
use crate::error::{AdvisorError, Result};
use crate::model::{PriceHistory, PriceHistoryRequest};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance market data client
pub struct YahooMarketData {
    base_url: String,
    client: reqwest::Client,
}

impl YahooMarketData {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url("https://query1.finance.yahoo.com", timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0")
            .timeout(timeout)
            .build()
            .map_err(|e| AdvisorError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl MarketDataGateway for YahooMarketData {
    async fn fetch(&self, request: &PriceHistoryRequest) -> Result<PriceHistory> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, request.ticker);
        tracing::info!(ticker = %request.ticker, period = %request.period, interval = %request.interval, "Fetching Yahoo chart");

        let response = self
            .client
            .get(&url)
            .query(&[("range", request.period.as_str()), ("interval", request.interval.as_str())])
            .send()
            .await
            .map_err(|e| AdvisorError::Market(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(no_data(request));
        }
        if !status.is_success() {
            return Err(AdvisorError::Market(format!("Yahoo returned {status}")));
        }

        let body: ChartResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::Market(format!("failed to parse chart response: {e}")))?;

        let history = parse_chart(body, request)?;
        tracing::info!(ticker = %request.ticker, bars = history.len(), "Fetched price history");
        Ok(history)
    }

    fn name(&self) -> &str {
        "Yahoo Finance"
    }
}

fn no_data(request: &PriceHistoryRequest) -> AdvisorError {
    AdvisorError::NoData {
        ticker: request.ticker.clone(),
        period: request.period.clone(),
        interval: request.interval.clone(),
    }
}

fn parse_chart(body: ChartResponse, request: &PriceHistoryRequest) -> Result<PriceHistory> {
    if let Some(error) = body.chart.error {
        return if error.code.eq_ignore_ascii_case("Not Found") {
            Err(no_data(request))
        } else {
            Err(AdvisorError::Market(format!("Yahoo API error: {} - {}", error.code, error.description)))
        };
    }

    let Some(data) = body.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(no_data(request));
    };

    let adjusted = data.indicators.adjclose.into_iter().next().map(|a| a.adjclose);
    let closes = match adjusted {
        Some(series) if !series.is_empty() => series,
        _ => data
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .unwrap_or_default(),
    };

    if data.timestamp.len() != closes.len() {
        return Err(AdvisorError::Market(format!(
            "Yahoo returned {} timestamps but {} closes for {}",
            data.timestamp.len(),
            closes.len(),
            request.ticker
        )));
    }

    let mut timestamps = Vec::with_capacity(closes.len());
    let mut close = Vec::with_capacity(closes.len());
    let mut last_ts: Option<i64> = None;
    for (ts, value) in data.timestamp.iter().zip(closes) {
        let (Some(value), Some(at)) = (value, Utc.timestamp_opt(*ts, 0).single()) else {
            continue;
        };
        // Yahoo repeats the live bar; the later quote wins
        if last_ts == Some(*ts) {
            if let Some(previous) = close.last_mut() {
                *previous = value;
            }
            continue;
        }
        last_ts = Some(*ts);
        timestamps.push(at.to_rfc3339_opts(SecondsFormat::Secs, false));
        close.push(value);
    }

    if close.is_empty() {
        return Err(no_data(request));
    }
    PriceHistory::new(request.ticker.clone(), timestamps, close)
}
