use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};
use structural_risk::trial::{DEFAULT_INITIAL_VALUE, DEFAULT_MAX_ROUNDS, DEFAULT_RUIN_THRESHOLD};
use structural_risk::{
    validate_clamp, ClampGrid, Regime, SweepConfig, TrialConfig, DEFAULT_MONTE_CARLO_SAMPLES,
};

/// Runtime configuration for one experiment: traced trials plus a clamp sweep.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Seed applied once to the master random stream
    #[serde_as(as = "DefaultOnNull")]
    pub seed: u64,
    /// Monte Carlo trials per sweep cell
    pub samples: usize,
    /// Lowest clamp step (clamp = step / 10)
    pub clamp_low: u32,
    /// Exclusive upper clamp step
    pub clamp_high: u32,
    /// Regimes to sweep; empty or null means all three
    #[serde_as(as = "DefaultOnNull")]
    pub regimes: Vec<Regime>,
    pub initial_value: f64,
    pub ruin_threshold: f64,
    pub max_rounds: usize,
    /// Fan each sweep cell out over this many random streams
    pub parallel_streams: Option<usize>,
    /// Regime of the traced single trials
    pub trace_regime: Regime,
    /// One traced trial per clamp; empty or null disables tracing
    #[serde_as(as = "DefaultOnNull")]
    pub trace_clamps: Vec<f64>,
    #[serde_as(as = "DefaultOnNull")]
    pub write_table: bool,
    #[serde_as(as = "DefaultOnNull")]
    pub write_csv: bool,
    #[serde_as(as = "DefaultOnNull")]
    pub write_plots: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            samples: DEFAULT_MONTE_CARLO_SAMPLES,
            clamp_low: 2,
            clamp_high: 10,
            regimes: Regime::ALL.to_vec(),
            initial_value: DEFAULT_INITIAL_VALUE,
            ruin_threshold: DEFAULT_RUIN_THRESHOLD,
            max_rounds: DEFAULT_MAX_ROUNDS,
            parallel_streams: None,
            trace_regime: Regime::Dynamic,
            trace_clamps: vec![0.5, 0.6, 0.7, 0.8, 0.9, 1.0],
            write_table: true,
            write_csv: true,
            write_plots: true,
        }
    }
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: RunConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.sweep_config().validate()?;

        for &clamp in &self.trace_clamps {
            validate_clamp(clamp)?;
        }
        for trace in self.trace_configs() {
            trace.validate()?;
        }

        anyhow::ensure!(
            self.write_table || self.write_csv || self.write_plots,
            "at least one of write_table, write_csv or write_plots must be enabled"
        );
        Ok(())
    }

    pub fn regimes(&self) -> Vec<Regime> {
        if self.regimes.is_empty() {
            Regime::ALL.to_vec()
        } else {
            self.regimes.clone()
        }
    }

    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            grid: ClampGrid {
                low: self.clamp_low,
                high: self.clamp_high,
            },
            regimes: self.regimes(),
            samples: self.samples,
            seed: self.seed,
            initial_value: self.initial_value,
            ruin_threshold: self.ruin_threshold,
            max_rounds: self.max_rounds,
            parallel_streams: self.parallel_streams,
        }
    }

    pub fn trace_configs(&self) -> Vec<TrialConfig> {
        self.trace_clamps
            .iter()
            .map(|&clamp| TrialConfig {
                regime: self.trace_regime,
                clamp,
                initial_value: self.initial_value,
                ruin_threshold: self.ruin_threshold,
                max_rounds: self.max_rounds,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::RunConfig;
    use structural_risk::{ClampGrid, Regime};

    #[test]
    fn default_config_is_valid() {
        let config = RunConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sweep_config().grid, ClampGrid::default());
        assert_eq!(config.trace_configs().len(), 6);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"samples": 50, "regimes": null, "trace_regime": "static"}"#)
                .unwrap();
        assert_eq!(config.samples, 50);
        assert_eq!(config.clamp_low, 2);
        assert_eq!(config.regimes(), Regime::ALL.to_vec());
        assert_eq!(config.trace_regime, Regime::Static);
        assert!(config.write_csv);
    }

    #[test]
    fn null_flag_disables_output() {
        let config: RunConfig = serde_json::from_str(r#"{"write_plots": null}"#).unwrap();
        assert!(!config.write_plots);
        assert!(config.write_table);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_trace = RunConfig {
            trace_clamps: vec![0.5, 1.2],
            ..RunConfig::default()
        };
        assert!(bad_trace.validate().is_err());

        let bad_grid = RunConfig {
            clamp_low: 4,
            clamp_high: 12,
            ..RunConfig::default()
        };
        assert!(bad_grid.validate().is_err());

        let nothing_written = RunConfig {
            write_table: false,
            write_csv: false,
            write_plots: false,
            ..RunConfig::default()
        };
        assert!(nothing_written.validate().is_err());
    }

    #[test]
    fn regime_subset_is_kept_in_order() {
        let config = RunConfig {
            regimes: vec![Regime::Dynamic, Regime::Stochastic],
            ..RunConfig::default()
        };
        assert_eq!(
            config.sweep_config().regimes,
            vec![Regime::Dynamic, Regime::Stochastic]
        );
    }
}
