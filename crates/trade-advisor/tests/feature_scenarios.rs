//! Feature engineering against independently computed references

use trade_advisor::{FeatureEngineer, PriceHistory};

fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0)).sqrt()
}

/// Closes built from a known log-return series
fn closes_from_returns(returns: &[f64]) -> Vec<f64> {
    let mut close = vec![100.0];
    for r in returns {
        let last = close[close.len() - 1];
        close.push(last * r.exp());
    }
    close
}

fn history(close: Vec<f64>) -> PriceHistory {
    let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let timestamps = (0..close.len())
        .map(|i| (start + chrono::Days::new(i as u64)).format("%Y-%m-%d").to_string())
        .collect();
    PriceHistory::new("AAPL", timestamps, close).unwrap()
}

#[test]
fn test_vol_regime_with_120_closes() {
    let returns: Vec<f64> = (0..119)
        .map(|i| {
            let i = f64::from(i);
            let scale = if i >= 99.0 { 0.025 } else { 0.008 };
            scale * (i * 0.9).sin() + 0.0004
        })
        .collect();
    let close = closes_from_returns(&returns);
    assert_eq!(close.len(), 120);

    let features = FeatureEngineer::new().compute(&history(close.clone())).unwrap();

    let observed: Vec<f64> = close.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let expected = std_dev(&observed[observed.len() - 20..]) / std_dev(&observed[observed.len().saturating_sub(120)..]);
    assert!((features.vol_regime - expected).abs() < 1e-9);
    assert!(features.vol_regime > 1.0);

    let expected_vol = std_dev(&observed[observed.len() - 60..]) * 252f64.sqrt();
    assert!((features.volatility_annualized - expected_vol).abs() < 1e-9);
    assert!((features.momentum_20d - (close[119] / close[99] - 1.0)).abs() < 1e-12);
}

#[test]
fn test_long_baseline_caps_at_120_returns() {
    let returns: Vec<f64> = (0..299).map(|i| 0.01 * (f64::from(i) * 0.37).cos()).collect();
    let close = closes_from_returns(&returns);

    let features = FeatureEngineer::new().compute(&history(close.clone())).unwrap();

    let observed: Vec<f64> = close.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let expected = std_dev(&observed[observed.len() - 20..]) / std_dev(&observed[observed.len() - 120..]);
    assert!((features.vol_regime - expected).abs() < 1e-9);
}
