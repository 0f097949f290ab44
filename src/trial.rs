//! Single trial of the investment game
//!
//! Two portfolios start from the same value. Every round both players see the
//! same round parameters and the same win/loss draw; only the fraction they
//! invest differs. Play stops when either portfolio is ruined or the round
//! cap is exceeded.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::round::{build_generator, Regime, RoundGenerator};
use crate::strategy::{expected_growth_fraction, expected_value_fraction};
use crate::SimError;

pub const DEFAULT_INITIAL_VALUE: f64 = 200.0;
pub const DEFAULT_RUIN_THRESHOLD: f64 = 1.0;
pub const DEFAULT_MAX_ROUNDS: usize = 200;
pub const DEFAULT_CLAMP: f64 = 0.8;

/// Trial configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialConfig {
    /// Rule generating each round's parameters
    pub regime: Regime,
    /// Risk throttle applied to both strategies' allocations, in (0, 1]
    pub clamp: f64,
    /// Starting value of both portfolios
    pub initial_value: f64,
    /// A portfolio below this value is ruined
    pub ruin_threshold: f64,
    /// Play stops once the round counter exceeds this cap
    pub max_rounds: usize,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            regime: Regime::Stochastic,
            clamp: DEFAULT_CLAMP,
            initial_value: DEFAULT_INITIAL_VALUE,
            ruin_threshold: DEFAULT_RUIN_THRESHOLD,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl TrialConfig {
    pub fn new(regime: Regime, clamp: f64) -> Result<Self, SimError> {
        let config = Self {
            regime,
            clamp,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        validate_clamp(self.clamp)?;

        if !(self.ruin_threshold.is_finite() && self.ruin_threshold > 0.0) {
            return Err(SimError::InvalidTrialSetting(format!(
                "ruin_threshold must be finite and > 0, got {}",
                self.ruin_threshold
            )));
        }

        if !(self.initial_value.is_finite() && self.initial_value >= self.ruin_threshold) {
            return Err(SimError::InvalidTrialSetting(format!(
                "initial_value must be finite and >= ruin_threshold, got {}",
                self.initial_value
            )));
        }

        if self.max_rounds == 0 {
            return Err(SimError::InvalidTrialSetting(
                "max_rounds must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Clamp must lie in (0, 1]. NaN is rejected.
pub fn validate_clamp(clamp: f64) -> Result<(), SimError> {
    if clamp > 0.0 && clamp <= 1.0 {
        Ok(())
    } else {
        Err(SimError::InvalidClamp(clamp))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialOutcome {
    /// At least one portfolio fell below the ruin threshold
    Ruined,
    /// The round counter exceeded the cap
    TimedOut,
}

/// Value of one player's portfolio and the number of rounds it has played.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub value: f64,
    pub round: usize,
}

impl PortfolioState {
    pub fn new(value: f64) -> Self {
        Self { value, round: 0 }
    }

    fn settle(&mut self, invested: f64, won: bool) {
        if won {
            self.value += invested;
        } else {
            self.value -= invested;
        }
        self.round += 1;
    }
}

/// Terminal values of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub expected_value: f64,
    pub expected_growth: f64,
    pub rounds: usize,
    pub outcome: TrialOutcome,
}

/// Full history of one trial, index 0 holding the initial value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialTrace {
    pub regime: Regime,
    pub clamp: f64,
    pub expected_value: Vec<f64>,
    pub expected_growth: Vec<f64>,
    pub rounds: Vec<usize>,
    pub outcome: TrialOutcome,
}

impl TrialTrace {
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn final_result(&self) -> TrialResult {
        TrialResult {
            expected_value: *self.expected_value.last().unwrap_or(&0.0),
            expected_growth: *self.expected_growth.last().unwrap_or(&0.0),
            rounds: *self.rounds.last().unwrap_or(&0),
            outcome: self.outcome,
        }
    }
}

/// Play one trial keeping only the terminal values.
pub fn run_trial<R: Rng + ?Sized>(config: &TrialConfig, rng: &mut R) -> Result<TrialResult, SimError> {
    config.validate()?;
    Ok(play(config, &build_generator(config.regime), rng, |_, _| {}))
}

/// Play one trial with a caller-supplied round generator; `config.regime` is ignored.
pub fn run_trial_with<G, R>(
    config: &TrialConfig,
    generator: &G,
    rng: &mut R,
) -> Result<TrialResult, SimError>
where
    G: RoundGenerator,
    R: Rng + ?Sized,
{
    config.validate()?;
    Ok(play(config, generator, rng, |_, _| {}))
}

/// Play one trial recording both portfolios after every round.
pub fn run_traced_trial<R: Rng + ?Sized>(
    config: &TrialConfig,
    rng: &mut R,
) -> Result<TrialTrace, SimError> {
    config.validate()?;

    let capacity = config.max_rounds + 2;
    let mut expected_value = Vec::with_capacity(capacity);
    let mut expected_growth = Vec::with_capacity(capacity);
    let mut rounds = Vec::with_capacity(capacity);

    expected_value.push(config.initial_value);
    expected_growth.push(config.initial_value);
    rounds.push(0);

    let result = play(config, &build_generator(config.regime), rng, |ev, egr| {
        expected_value.push(ev.value);
        expected_growth.push(egr.value);
        rounds.push(ev.round);
    });

    Ok(TrialTrace {
        regime: config.regime,
        clamp: config.clamp,
        expected_value,
        expected_growth,
        rounds,
        outcome: result.outcome,
    })
}

/// Round loop shared by every trial flavour. `config` must already be valid.
pub(crate) fn play<G, R, F>(
    config: &TrialConfig,
    generator: &G,
    rng: &mut R,
    mut observe: F,
) -> TrialResult
where
    G: RoundGenerator,
    R: Rng + ?Sized,
    F: FnMut(&PortfolioState, &PortfolioState),
{
    let mut expected_value = PortfolioState::new(config.initial_value);
    let mut expected_growth = PortfolioState::new(config.initial_value);

    loop {
        let round = generator.generate(rng);

        let ev_stake = expected_value.value * expected_value_fraction(&round) * config.clamp;
        let egr_stake = expected_growth.value * expected_growth_fraction(&round) * config.clamp;

        // One draw settles both portfolios.
        let won = rng.gen::<f64>() < round.win_probability;
        expected_value.settle(ev_stake, won);
        expected_growth.settle(egr_stake, won);
        observe(&expected_value, &expected_growth);

        let outcome = if expected_value.value < config.ruin_threshold
            || expected_growth.value < config.ruin_threshold
        {
            Some(TrialOutcome::Ruined)
        } else if expected_value.round > config.max_rounds {
            Some(TrialOutcome::TimedOut)
        } else {
            None
        };

        if let Some(outcome) = outcome {
            return TrialResult {
                expected_value: expected_value.value,
                expected_growth: expected_growth.value,
                rounds: expected_value.round,
                outcome,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::RoundParameters;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct LosingRounds;

    impl RoundGenerator for LosingRounds {
        fn generate<R: Rng + ?Sized>(&self, _rng: &mut R) -> RoundParameters {
            RoundParameters {
                upside: 1.2,
                downside: 1.0,
                win_probability: 0.3,
            }
        }
    }

    #[test]
    fn static_regime_terminates_within_cap() {
        let config = TrialConfig::new(Regime::Static, 0.8).unwrap();
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let result = run_trial(&config, &mut rng).unwrap();
            assert!(result.rounds >= 1 && result.rounds <= 201);
            if result.outcome == TrialOutcome::TimedOut {
                assert_eq!(result.rounds, 201);
            }
        }
    }

    #[test]
    fn abstaining_players_time_out_after_201_rounds() {
        let config = TrialConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = run_trial_with(&config, &LosingRounds, &mut rng).unwrap();
        assert_eq!(result.outcome, TrialOutcome::TimedOut);
        assert_eq!(result.rounds, DEFAULT_MAX_ROUNDS + 1);
        assert_eq!(result.expected_value, DEFAULT_INITIAL_VALUE);
        assert_eq!(result.expected_growth, DEFAULT_INITIAL_VALUE);
    }

    #[test]
    fn full_clamp_ruins_expected_value_player() {
        let config = TrialConfig::new(Regime::Static, 1.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2026);
        let result = run_trial(&config, &mut rng).unwrap();
        assert_eq!(result.outcome, TrialOutcome::Ruined);
        assert_eq!(result.expected_value, 0.0);
        assert!(result.expected_growth > 0.0);
    }

    #[test]
    fn traced_and_final_only_agree() {
        for regime in Regime::ALL {
            let config = TrialConfig::new(regime, 0.7).unwrap();
            let mut a = ChaCha8Rng::seed_from_u64(42);
            let mut b = ChaCha8Rng::seed_from_u64(42);

            let result = run_trial(&config, &mut a).unwrap();
            let trace = run_traced_trial(&config, &mut b).unwrap();

            assert_eq!(trace.final_result(), result);
            assert_eq!(trace.len(), result.rounds + 1);
            assert_eq!(trace.rounds, (0..=result.rounds).collect::<Vec<_>>());
            assert_eq!(trace.expected_value[0], DEFAULT_INITIAL_VALUE);
            assert_eq!(a.gen::<u64>(), b.gen::<u64>());
        }
    }

    #[test]
    fn ruined_values_never_feed_another_round() {
        let config = TrialConfig::new(Regime::Stochastic, 0.9).unwrap();
        for seed in 0..30 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let trace = run_traced_trial(&config, &mut rng).unwrap();
            let last = trace.len() - 1;
            for idx in 0..last {
                assert!(trace.expected_value[idx] >= config.ruin_threshold);
                assert!(trace.expected_growth[idx] >= config.ruin_threshold);
            }
            assert!(trace.expected_value[last] >= 0.0);
            assert!(trace.expected_growth[last] >= 0.0);
        }
    }

    #[test]
    fn both_portfolios_share_each_outcome() {
        let config = TrialConfig::new(Regime::Static, 0.5).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let trace = run_traced_trial(&config, &mut rng).unwrap();
        for idx in 1..trace.len() {
            let ev_up = trace.expected_value[idx] > trace.expected_value[idx - 1];
            let egr_up = trace.expected_growth[idx] > trace.expected_growth[idx - 1];
            assert_eq!(ev_up, egr_up);
        }
    }

    #[test]
    fn clamp_outside_unit_interval_is_rejected() {
        assert_eq!(
            TrialConfig::new(Regime::Static, 0.0),
            Err(SimError::InvalidClamp(0.0))
        );
        assert_eq!(
            TrialConfig::new(Regime::Static, 1.5),
            Err(SimError::InvalidClamp(1.5))
        );
        assert!(matches!(
            TrialConfig::new(Regime::Static, f64::NAN),
            Err(SimError::InvalidClamp(_))
        ));
        assert!(TrialConfig::new(Regime::Static, 1.0).is_ok());

        let config = TrialConfig {
            clamp: -0.2,
            ..TrialConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(run_trial(&config, &mut rng).is_err());
    }

    #[test]
    fn invalid_trial_settings_are_rejected() {
        let zero_cap = TrialConfig {
            max_rounds: 0,
            ..TrialConfig::default()
        };
        assert!(matches!(
            zero_cap.validate(),
            Err(SimError::InvalidTrialSetting(_))
        ));

        let below_ruin = TrialConfig {
            initial_value: 0.5,
            ..TrialConfig::default()
        };
        assert!(below_ruin.validate().is_err());
    }
}
