//! Structural Risk - expected value vs. expected growth rate
//!
//! Simulates repeated investment games in which one player maximizes the
//! expected value of each round and the other maximizes the expected growth
//! rate (the Kelly strategy). Both players face the same round parameters and
//! the same win/loss draw, so every trial is a paired comparison. Trials are
//! averaged by Monte Carlo and swept across a grid of risk clamps.

pub mod monte_carlo;
pub mod round;
pub mod strategy;
pub mod sweep;
pub mod trial;

use thiserror::Error;

// Re-export main types
pub use monte_carlo::{
    run_monte_carlo, run_monte_carlo_parallel, MonteCarloAccumulator, MonteCarloSummary,
    DEFAULT_MONTE_CARLO_SAMPLES,
};
pub use round::{
    build_generator, DynamicRounds, Regime, RoundGenerator, RoundParameters, RoundSource,
    StaticRounds, StochasticRounds,
};
pub use strategy::{compute_edge, expected_growth_fraction, expected_value_fraction, Strategy};
pub use sweep::{
    run_clamp_sweep, run_clamp_sweep_with, ClampGrid, ClampSweepResult, RegimeSweep, SweepConfig,
};
pub use trial::{
    run_traced_trial, run_trial, run_trial_with, validate_clamp, PortfolioState, TrialConfig,
    TrialOutcome, TrialResult, TrialTrace,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("invalid regime selector {0}: expected 0 (stochastic), 1 (static) or 2 (dynamic)")]
    InvalidRegimeSelector(i64),
    #[error("unknown regime '{0}': expected stochastic, static, dynamic or 0-2")]
    UnknownRegime(String),
    #[error("invalid clamp {0}: must lie in (0, 1]")]
    InvalidClamp(f64),
    #[error(
        "degenerate round parameters: upside={upside}, downside={downside}, \
         win_probability={win_probability}"
    )]
    DegenerateRoundParameters {
        upside: f64,
        downside: f64,
        win_probability: f64,
    },
    #[error("Monte Carlo sample count must be greater than zero")]
    InvalidSampleCount,
    #[error("invalid clamp grid {low}..{high}: need 1 <= low < high <= 11")]
    InvalidClampGrid { low: u32, high: u32 },
    #[error("invalid trial setting: {0}")]
    InvalidTrialSetting(String),
}
