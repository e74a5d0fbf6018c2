//! Decision Policy
//!
//! Hard risk constraints applied to every model decision before it is
//! persisted. Only the single-ticker weight cap is enforced here; the
//! volatility-regime guidance in the system prompt stays advisory.

use crate::model::Decision;

/// Maximum portfolio weight for any single ticker
pub const MAX_SINGLE_TICKER_WEIGHT: f64 = 0.25;

#[derive(Clone, Copy, Debug)]
pub struct DecisionPolicy {
    max_single_ticker_weight: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            max_single_ticker_weight: MAX_SINGLE_TICKER_WEIGHT,
        }
    }
}

impl DecisionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_single_ticker_weight(&self) -> f64 {
        self.max_single_ticker_weight
    }

    /// Clamp a decision into policy bounds, returning a new value
    pub fn apply(&self, decision: &Decision) -> Decision {
        let mut clamped = decision.clone();
        if decision.target_weight > self.max_single_ticker_weight {
            tracing::info!(
                requested = decision.target_weight,
                cap = self.max_single_ticker_weight,
                "Clamping target weight to policy cap"
            );
            clamped.target_weight = self.max_single_ticker_weight;
        }
        clamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Action;
    use proptest::prelude::*;

    fn decision(target_weight: f64) -> Decision {
        Decision {
            action: Action::Buy,
            target_weight,
            confidence: 0.9,
            rationale: "strong momentum".into(),
            risk_notes: "concentration".into(),
        }
    }

    #[test]
    fn test_clamps_overweight() {
        let applied = DecisionPolicy::new().apply(&decision(0.8));
        assert!((applied.target_weight - 0.25).abs() < f64::EPSILON);
        assert_eq!(applied.rationale, "strong momentum");
        assert_eq!(applied.action, Action::Buy);
    }

    #[test]
    fn test_leaves_input_untouched() {
        let original = decision(0.6);
        let _ = DecisionPolicy::new().apply(&original);
        assert!((original.target_weight - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_under_cap_unchanged() {
        let original = decision(0.1);
        assert_eq!(DecisionPolicy::new().apply(&original), original);
    }

    proptest! {
        #[test]
        fn prop_weight_never_exceeds_cap(weight in 0.0f64..=1.0) {
            let policy = DecisionPolicy::new();
            let once = policy.apply(&decision(weight));
            prop_assert!(once.target_weight <= MAX_SINGLE_TICKER_WEIGHT);
            prop_assert_eq!(policy.apply(&once), once);
        }
    }
}
