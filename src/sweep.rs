//! Clamp parameter sweep
//!
//! Runs the Monte Carlo aggregator for every regime and every clamp on a
//! linear grid. Regimes are the outer loop and clamps the inner loop in
//! ascending order; reports rely on that positional layout.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::monte_carlo::{
    run_monte_carlo, run_monte_carlo_parallel, MonteCarloSummary, DEFAULT_MONTE_CARLO_SAMPLES,
};
use crate::round::Regime;
use crate::trial::{TrialConfig, DEFAULT_INITIAL_VALUE, DEFAULT_MAX_ROUNDS, DEFAULT_RUIN_THRESHOLD};
use crate::SimError;

/// Clamp grid `low/10, (low+1)/10, ..., (high-1)/10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClampGrid {
    pub low: u32,
    pub high: u32,
}

impl Default for ClampGrid {
    fn default() -> Self {
        Self { low: 2, high: 10 }
    }
}

impl ClampGrid {
    pub fn new(low: u32, high: u32) -> Result<Self, SimError> {
        let grid = Self { low, high };
        grid.validate()?;
        Ok(grid)
    }

    /// Every clamp must stay in (0, 1], so `1 <= low < high <= 11`.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.low >= 1 && self.low < self.high && self.high <= 11 {
            Ok(())
        } else {
            Err(SimError::InvalidClampGrid {
                low: self.low,
                high: self.high,
            })
        }
    }

    pub fn values(&self) -> Vec<f64> {
        // k / 10 rather than k * 0.1 keeps 0.3, 0.6, 0.7 on their nearest doubles
        (self.low..self.high).map(|k| f64::from(k) / 10.0).collect()
    }

    pub fn len(&self) -> usize {
        self.high.saturating_sub(self.low) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub grid: ClampGrid,
    pub regimes: Vec<Regime>,
    pub samples: usize,
    pub seed: u64,
    pub initial_value: f64,
    pub ruin_threshold: f64,
    pub max_rounds: usize,
    /// `None` plays every trial on the master stream; `Some(n)` fans each
    /// cell out over `n` derived streams.
    pub parallel_streams: Option<usize>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            grid: ClampGrid::default(),
            regimes: Regime::ALL.to_vec(),
            samples: DEFAULT_MONTE_CARLO_SAMPLES,
            seed: 0,
            initial_value: DEFAULT_INITIAL_VALUE,
            ruin_threshold: DEFAULT_RUIN_THRESHOLD,
            max_rounds: DEFAULT_MAX_ROUNDS,
            parallel_streams: None,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        self.grid.validate()?;

        if self.samples == 0 {
            return Err(SimError::InvalidSampleCount);
        }

        if self.regimes.is_empty() {
            return Err(SimError::InvalidTrialSetting(
                "at least one regime must be swept".to_string(),
            ));
        }

        for (idx, regime) in self.regimes.iter().enumerate() {
            if self.regimes[..idx].contains(regime) {
                return Err(SimError::InvalidTrialSetting(format!(
                    "regime {regime} listed more than once"
                )));
            }
        }

        if self.parallel_streams == Some(0) {
            return Err(SimError::InvalidTrialSetting(
                "parallel_streams must be greater than zero".to_string(),
            ));
        }

        let high_clamp = f64::from(self.grid.high - 1) / 10.0;
        self.trial_config(self.regimes[0], high_clamp).validate()
    }

    pub fn trial_config(&self, regime: Regime, clamp: f64) -> TrialConfig {
        TrialConfig {
            regime,
            clamp,
            initial_value: self.initial_value,
            ruin_threshold: self.ruin_threshold,
            max_rounds: self.max_rounds,
        }
    }
}

/// Sweep results of one regime, cells in ascending clamp order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeSweep {
    pub regime: Regime,
    pub cells: Vec<MonteCarloSummary>,
}

impl RegimeSweep {
    pub fn clamps(&self) -> Vec<f64> {
        self.cells.iter().map(|cell| cell.clamp).collect()
    }

    pub fn mean_expected_value(&self) -> Vec<f64> {
        self.cells.iter().map(|cell| cell.mean_expected_value).collect()
    }

    pub fn mean_expected_growth(&self) -> Vec<f64> {
        self.cells.iter().map(|cell| cell.mean_expected_growth).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClampSweepResult {
    pub seed: u64,
    pub samples: usize,
    pub clamps: Vec<f64>,
    pub regimes: Vec<RegimeSweep>,
}

impl ClampSweepResult {
    /// Mean final values `(expected value, expected growth)` for one cell.
    pub fn get(&self, regime: Regime, clamp: f64) -> Option<(f64, f64)> {
        self.regimes
            .iter()
            .find(|sweep| sweep.regime == regime)?
            .cells
            .iter()
            .find(|cell| (cell.clamp - clamp).abs() < 1e-9)
            .map(|cell| (cell.mean_expected_value, cell.mean_expected_growth))
    }

    pub fn cells(&self) -> impl Iterator<Item = &MonteCarloSummary> {
        self.regimes.iter().flat_map(|sweep| sweep.cells.iter())
    }
}

/// Seed a fresh ChaCha stream from `config.seed` and run the sweep on it.
pub fn run_clamp_sweep(config: &SweepConfig) -> Result<ClampSweepResult, SimError> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    run_clamp_sweep_with(config, &mut rng)
}

/// Run the sweep on a caller-owned stream.
///
/// In parallel mode each cell draws its sub-seed from `rng` in iteration
/// order, so the result is still a pure function of the stream state.
pub fn run_clamp_sweep_with<R: Rng + ?Sized>(
    config: &SweepConfig,
    rng: &mut R,
) -> Result<ClampSweepResult, SimError> {
    config.validate()?;

    let clamps = config.grid.values();
    let mut regimes = Vec::with_capacity(config.regimes.len());

    for &regime in &config.regimes {
        info!(regime = %regime, clamps = clamps.len(), samples = config.samples, "sweeping regime");
        let mut cells = Vec::with_capacity(clamps.len());

        for &clamp in &clamps {
            let trial = config.trial_config(regime, clamp);
            let summary = match config.parallel_streams {
                None => run_monte_carlo(&trial, config.samples, rng)?,
                Some(streams) => {
                    let cell_seed = rng.gen::<u64>();
                    run_monte_carlo_parallel(&trial, config.samples, cell_seed, streams)?
                }
            };
            cells.push(summary);
        }

        info!(regime = %regime, "regime sweep complete");
        regimes.push(RegimeSweep { regime, cells });
    }

    Ok(ClampSweepResult {
        seed: config.seed,
        samples: config.samples,
        clamps,
        regimes,
    })
}
