//! Feature Engineering
//!
//! Pure transform from a close-price series to [`MarketFeatures`]:
//!
//! ```text
//! r_t            = ln(close_t / close_{t-1})
//! volatility     = stddev(r[-60:], ddof=1) * sqrt(252)
//! momentum_20d   = close[-1] / close[-21] - 1
//! vol_regime     = stddev(r[-20:]) / max(stddev(r[-120:]), 1e-12)
//! ```
//!
//! The long window uses every available return when fewer than 120 exist.

use crate::error::{AdvisorError, Result};
use crate::model::{MarketFeatures, PriceHistory};

/// Computes market features from price history
#[derive(Clone, Copy, Debug, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    /// Minimum closes required by [`compute`](Self::compute)
    pub const MIN_OBSERVATIONS: usize = 60;

    const VOLATILITY_WINDOW: usize = 60;
    const MOMENTUM_LOOKBACK: usize = 20;
    const SHORT_VOL_WINDOW: usize = 20;
    const LONG_VOL_WINDOW: usize = 120;
    const TRADING_DAYS: f64 = 252.0;
    const EPSILON: f64 = 1e-12;

    pub fn new() -> Self {
        Self
    }

    pub fn compute(&self, history: &PriceHistory) -> Result<MarketFeatures> {
        let close = &history.close;
        if close.len() < Self::MIN_OBSERVATIONS {
            return Err(AdvisorError::InsufficientData {
                required: Self::MIN_OBSERVATIONS,
                actual: close.len(),
            });
        }
        if let Some((idx, value)) = close.iter().enumerate().find(|(_, c)| !c.is_finite() || **c <= 0.0) {
            return Err(AdvisorError::InvalidPriceHistory(format!(
                "close[{idx}] = {value} is not a positive finite price"
            )));
        }

        let returns = log_returns(close);
        let last_close = close[close.len() - 1];
        let reference = close[close.len() - 1 - Self::MOMENTUM_LOOKBACK];

        let daily_vol = sample_std(last(&returns, Self::VOLATILITY_WINDOW));
        let short_vol = sample_std(last(&returns, Self::SHORT_VOL_WINDOW));
        let long_vol = sample_std(last(&returns, Self::LONG_VOL_WINDOW));

        Ok(MarketFeatures {
            ticker: history.ticker.clone(),
            last_close,
            volatility_annualized: daily_vol * Self::TRADING_DAYS.sqrt(),
            momentum_20d: last_close / reference - 1.0,
            vol_regime: short_vol / long_vol.max(Self::EPSILON),
        })
    }
}

/// Log returns of consecutive pairs
pub fn log_returns(close: &[f64]) -> Vec<f64> {
    close.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

/// Sample standard deviation (ddof = 1)
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sum_sq = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    (sum_sq / (n - 1.0)).sqrt()
}

fn last(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn history(close: Vec<f64>) -> PriceHistory {
        let timestamps = (0..close.len())
            .map(|i| {
                let secs = 1_704_067_200 + 86_400 * i64::try_from(i).unwrap();
                chrono::DateTime::from_timestamp(secs, 0).unwrap().to_rfc3339()
            })
            .collect();
        PriceHistory::new("TEST", timestamps, close).unwrap()
    }

    /// Deterministic wiggle so windows have distinct volatility
    fn series(n: usize) -> Vec<f64> {
        let mut price = 100.0;
        (0..n)
            .map(|i| {
                let amplitude = if i > n.saturating_sub(20) { 0.03 } else { 0.01 };
                #[allow(clippy::cast_precision_loss)]
                let shock = ((i as f64) * 1.7).sin() * amplitude;
                price *= 1.0 + shock;
                price
            })
            .collect()
    }

    #[test]
    fn test_insufficient_data() {
        let err = FeatureEngineer::new().compute(&history(series(59))).unwrap_err();
        match err {
            AdvisorError::InsufficientData { required, actual } => {
                assert_eq!(required, 60);
                assert_eq!(actual, 59);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_non_positive_close() {
        let mut close = series(80);
        close[10] = 0.0;
        assert!(matches!(
            FeatureEngineer::new().compute(&history(close)),
            Err(AdvisorError::InvalidPriceHistory(_))
        ));
    }

    #[test]
    fn test_momentum_uses_21_bar_reference() {
        let close: Vec<f64> = (1..=60).map(f64::from).collect();
        let features = FeatureEngineer::new().compute(&history(close)).unwrap();
        assert!((features.last_close - 60.0).abs() < 1e-12);
        assert!((features.momentum_20d - (60.0 / 40.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_volatility_matches_independent_computation() {
        let close = series(200);
        let features = FeatureEngineer::new().compute(&history(close.clone())).unwrap();

        let returns: Vec<f64> = close.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let tail = &returns[returns.len() - 60..];
        let mean = tail.iter().sum::<f64>() / 60.0;
        let var = tail.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 59.0;
        assert!((features.volatility_annualized - var.sqrt() * 252f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_vol_regime_with_short_baseline() {
        let close = series(80);
        let features = FeatureEngineer::new().compute(&history(close.clone())).unwrap();
        let returns = log_returns(&close);
        let expected = sample_std(&returns[returns.len() - 20..]) / sample_std(&returns);
        assert!((features.vol_regime - expected).abs() < 1e-9);
        assert!(features.vol_regime > 1.0);
    }

    #[test]
    fn test_flat_series_is_finite() {
        let features = FeatureEngineer::new().compute(&history(vec![50.0; 60])).unwrap();
        assert!(features.volatility_annualized.abs() < f64::EPSILON);
        assert!(features.vol_regime.abs() < f64::EPSILON);
        assert!(features.momentum_20d.abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_compute_is_deterministic(close in prop::collection::vec(1.0f64..1000.0, 60..300)) {
            let engineer = FeatureEngineer::new();
            let first = engineer.compute(&history(close.clone())).unwrap();
            let second = engineer.compute(&history(close)).unwrap();
            prop_assert_eq!(first.volatility_annualized.to_bits(), second.volatility_annualized.to_bits());
            prop_assert_eq!(first.momentum_20d.to_bits(), second.momentum_20d.to_bits());
            prop_assert_eq!(first.vol_regime.to_bits(), second.vol_regime.to_bits());
            prop_assert!(first.volatility_annualized.is_finite());
            prop_assert!(first.vol_regime.is_finite());
        }

        #[test]
        fn prop_short_series_always_fails(close in prop::collection::vec(1.0f64..1000.0, 0..60)) {
            let result = FeatureEngineer::new().compute(&history(close));
            let is_insufficient = matches!(result, Err(AdvisorError::InsufficientData { .. }));
            prop_assert!(is_insufficient);
        }
    }
}
