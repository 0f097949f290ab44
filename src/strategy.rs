//! Allocation strategies
//!
//! Both strategies look at the same quantity, the edge, obtained by setting
//! `p * upside - (1 - p) * downside = 0` per unit staked. The expected value
//! of a round is linear in the invested fraction, so maximizing it means going
//! all in whenever the edge is positive and staying out otherwise. The
//! expected growth rate is maximized by betting proportionally to the edge.

use serde::{Deserialize, Serialize};

use crate::round::RoundParameters;

/// Edge of a binary bet paying `upside` on a win and losing `downside` on a loss.
///
/// `downside` must be positive; the generators guarantee it.
pub fn compute_edge(upside: f64, downside: f64, win_probability: f64) -> f64 {
    win_probability / downside - (1.0 - win_probability) / upside
}

fn edge(params: &RoundParameters) -> f64 {
    compute_edge(params.upside, params.downside, params.win_probability)
}

/// Fraction invested by the expected-value maximizer: 1 or 0.
pub fn expected_value_fraction(params: &RoundParameters) -> f64 {
    if edge(params) > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Kelly fraction: the edge, capped at full investment and floored at zero.
pub fn expected_growth_fraction(params: &RoundParameters) -> f64 {
    edge(params).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ExpectedValue,
    ExpectedGrowth,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::ExpectedValue, Strategy::ExpectedGrowth];

    pub fn fraction(self, params: &RoundParameters) -> f64 {
        match self {
            Strategy::ExpectedValue => expected_value_fraction(params),
            Strategy::ExpectedGrowth => expected_growth_fraction(params),
        }
    }

    /// Short label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            Strategy::ExpectedValue => "EV",
            Strategy::ExpectedGrowth => "EGR",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Strategy::ExpectedValue => "expected value strategy",
            Strategy::ExpectedGrowth => "expected growth rate strategy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(upside: f64, downside: f64, p: f64) -> RoundParameters {
        RoundParameters::new(upside, downside, p).unwrap()
    }

    #[test]
    fn static_round_strategy_math() {
        let round = params(2.0, 1.0, 0.6);
        assert_relative_eq!(compute_edge(2.0, 1.0, 0.6), 0.4, epsilon = 1e-12);
        assert_eq!(expected_value_fraction(&round), 1.0);
        assert_relative_eq!(expected_growth_fraction(&round), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn negative_edge_means_abstain() {
        let round = params(1.2, 1.0, 0.3);
        assert!(compute_edge(1.2, 1.0, 0.3) < 0.0);
        assert_eq!(expected_value_fraction(&round), 0.0);
        assert_eq!(expected_growth_fraction(&round), 0.0);
    }

    #[test]
    fn kelly_fraction_caps_at_full_investment() {
        // p / 0.1 dominates: edge well above one
        let round = params(1.5, 0.1, 0.9);
        assert!(compute_edge(1.5, 0.1, 0.9) > 1.0);
        assert_eq!(expected_growth_fraction(&round), 1.0);
        assert_eq!(expected_value_fraction(&round), 1.0);
    }

    #[test]
    fn zero_edge_is_not_an_investment() {
        // 0.5 / 1 - 0.5 / 1 == 0 exactly
        let round = params(1.0, 1.0, 0.5);
        assert_eq!(compute_edge(1.0, 1.0, 0.5), 0.0);
        assert_eq!(expected_value_fraction(&round), 0.0);
        assert_eq!(expected_growth_fraction(&round), 0.0);
    }

    #[test]
    fn strategy_variant_dispatches() {
        let round = params(2.0, 1.0, 0.6);
        assert_eq!(Strategy::ExpectedValue.fraction(&round), 1.0);
        assert_relative_eq!(
            Strategy::ExpectedGrowth.fraction(&round),
            0.4,
            epsilon = 1e-12
        );
        assert_eq!(Strategy::ExpectedValue.label(), "EV");
        assert_eq!(Strategy::ExpectedGrowth.label(), "EGR");
    }
}
