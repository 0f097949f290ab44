//! Monte Carlo averaging of final portfolio values
//!
//! Many independent final-only trials are played for one regime and clamp;
//! the running totals of each strategy's terminal value give the mean.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::round::{build_generator, Regime};
use crate::trial::{play, TrialConfig, TrialOutcome, TrialResult};
use crate::SimError;

pub const DEFAULT_MONTE_CARLO_SAMPLES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub regime: Regime,
    pub clamp: f64,
    pub samples: usize,
    pub mean_expected_value: f64,
    pub mean_expected_growth: f64,
    pub ruined: usize,
    pub timed_out: usize,
    pub mean_rounds: f64,
}

/// Running totals over trials.
#[derive(Debug, Default, Clone)]
pub struct MonteCarloAccumulator {
    samples: usize,
    sum_expected_value: f64,
    sum_expected_growth: f64,
    ruined: usize,
    timed_out: usize,
    total_rounds: usize,
}

impl MonteCarloAccumulator {
    pub fn observe(&mut self, result: &TrialResult) {
        self.samples += 1;
        self.sum_expected_value += result.expected_value;
        self.sum_expected_growth += result.expected_growth;
        self.total_rounds += result.rounds;
        match result.outcome {
            TrialOutcome::Ruined => self.ruined += 1,
            TrialOutcome::TimedOut => self.timed_out += 1,
        }
    }

    pub fn merge(&mut self, other: &MonteCarloAccumulator) {
        self.samples += other.samples;
        self.sum_expected_value += other.sum_expected_value;
        self.sum_expected_growth += other.sum_expected_growth;
        self.ruined += other.ruined;
        self.timed_out += other.timed_out;
        self.total_rounds += other.total_rounds;
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn finish(&self, config: &TrialConfig) -> MonteCarloSummary {
        let n = self.samples.max(1) as f64;
        MonteCarloSummary {
            regime: config.regime,
            clamp: config.clamp,
            samples: self.samples,
            mean_expected_value: self.sum_expected_value / n,
            mean_expected_growth: self.sum_expected_growth / n,
            ruined: self.ruined,
            timed_out: self.timed_out,
            mean_rounds: self.total_rounds as f64 / n,
        }
    }
}

/// Average `samples` final-only trials drawn from `rng`.
pub fn run_monte_carlo<R: Rng + ?Sized>(
    config: &TrialConfig,
    samples: usize,
    rng: &mut R,
) -> Result<MonteCarloSummary, SimError> {
    config.validate()?;
    if samples == 0 {
        return Err(SimError::InvalidSampleCount);
    }

    let generator = build_generator(config.regime);
    let mut acc = MonteCarloAccumulator::default();
    for _ in 0..samples {
        acc.observe(&play(config, &generator, rng, |_, _| {}));
    }

    let summary = acc.finish(config);
    log_summary(&summary);
    Ok(summary)
}

/// Average `samples` trials split over `streams` independent ChaCha streams.
///
/// Stream `k` is `ChaCha8Rng::seed_from_u64(seed)` with stream id `k`. Chunks
/// are merged in stream order, so the result does not depend on the thread
/// pool.
pub fn run_monte_carlo_parallel(
    config: &TrialConfig,
    samples: usize,
    seed: u64,
    streams: usize,
) -> Result<MonteCarloSummary, SimError> {
    config.validate()?;
    if samples == 0 {
        return Err(SimError::InvalidSampleCount);
    }
    if streams == 0 {
        return Err(SimError::InvalidTrialSetting(
            "parallel stream count must be greater than zero".to_string(),
        ));
    }

    let streams = streams.min(samples);
    let per_stream = samples / streams;
    let remainder = samples % streams;
    let generator = build_generator(config.regime);

    let partials: Vec<MonteCarloAccumulator> = (0..streams)
        .into_par_iter()
        .map(|stream| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(stream as u64);

            let count = per_stream + usize::from(stream < remainder);
            let mut acc = MonteCarloAccumulator::default();
            for _ in 0..count {
                acc.observe(&play(config, &generator, &mut rng, |_, _| {}));
            }
            acc
        })
        .collect();

    let mut total = MonteCarloAccumulator::default();
    for partial in &partials {
        total.merge(partial);
    }

    let summary = total.finish(config);
    log_summary(&summary);
    Ok(summary)
}

fn log_summary(summary: &MonteCarloSummary) {
    debug!(
        regime = %summary.regime,
        clamp = summary.clamp,
        samples = summary.samples,
        mean_ev = summary.mean_expected_value,
        mean_egr = summary.mean_expected_growth,
        ruined = summary.ruined,
        timed_out = summary.timed_out,
        "monte carlo cell complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::run_trial;

    #[test]
    fn single_sample_equals_single_trial() {
        for regime in Regime::ALL {
            let config = TrialConfig::new(regime, 0.8).unwrap();
            let mut a = ChaCha8Rng::seed_from_u64(123);
            let mut b = ChaCha8Rng::seed_from_u64(123);

            let summary = run_monte_carlo(&config, 1, &mut a).unwrap();
            let trial = run_trial(&config, &mut b).unwrap();

            assert_eq!(summary.mean_expected_value, trial.expected_value);
            assert_eq!(summary.mean_expected_growth, trial.expected_growth);
            assert_eq!(summary.mean_rounds, trial.rounds as f64);
            assert_eq!(summary.samples, 1);
        }
    }

    #[test]
    fn mean_is_sum_over_trials() {
        let config = TrialConfig::new(Regime::Dynamic, 0.6).unwrap();
        let mut a = ChaCha8Rng::seed_from_u64(9);
        let mut b = ChaCha8Rng::seed_from_u64(9);

        let summary = run_monte_carlo(&config, 25, &mut a).unwrap();

        let mut sum_ev = 0.0;
        let mut sum_egr = 0.0;
        for _ in 0..25 {
            let trial = run_trial(&config, &mut b).unwrap();
            sum_ev += trial.expected_value;
            sum_egr += trial.expected_growth;
        }

        assert_eq!(summary.mean_expected_value, sum_ev / 25.0);
        assert_eq!(summary.mean_expected_growth, sum_egr / 25.0);
        assert_eq!(summary.ruined + summary.timed_out, 25);
    }

    #[test]
    fn zero_samples_are_rejected() {
        let config = TrialConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(
            run_monte_carlo(&config, 0, &mut rng),
            Err(SimError::InvalidSampleCount)
        );
        assert_eq!(
            run_monte_carlo_parallel(&config, 0, 0, 4),
            Err(SimError::InvalidSampleCount)
        );
        assert!(run_monte_carlo_parallel(&config, 10, 0, 0).is_err());
    }

    #[test]
    fn parallel_run_is_reproducible() {
        let config = TrialConfig::new(Regime::Stochastic, 0.7).unwrap();
        let a = run_monte_carlo_parallel(&config, 203, 77, 8).unwrap();
        let b = run_monte_carlo_parallel(&config, 203, 77, 8).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.samples, 203);
        assert_eq!(a.ruined + a.timed_out, 203);
    }

    #[test]
    fn parallel_single_stream_matches_sequential() {
        let config = TrialConfig::new(Regime::Dynamic, 0.9).unwrap();
        let parallel = run_monte_carlo_parallel(&config, 40, 5, 1).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        rng.set_stream(0);
        let sequential = run_monte_carlo(&config, 40, &mut rng).unwrap();

        assert_eq!(parallel, sequential);
    }

    #[test]
    fn more_streams_than_samples_is_capped() {
        let config = TrialConfig::new(Regime::Static, 0.8).unwrap();
        let summary = run_monte_carlo_parallel(&config, 3, 1, 16).unwrap();
        assert_eq!(summary.samples, 3);
    }
}
