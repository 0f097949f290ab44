//! Experiment runner for `structural-risk`.
//!
//! Plays a handful of traced single trials, sweeps the clamp grid by Monte
//! Carlo, and writes the results to a timestamped run directory as a text
//! table, CSV files, SVG plots and a JSON summary.

pub mod config;
pub mod output;
pub mod plot;
pub mod report;

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use structural_risk::{
    run_clamp_sweep_with, run_traced_trial, ClampSweepResult, MonteCarloSummary, Regime,
    TrialOutcome, TrialTrace,
};
use tracing::info;

use crate::config::RunConfig;
use crate::output::{
    create_timestamped_run_dir, resolve_output_base_dir, trace_csv_name, write_summary_json,
    write_sweep_csv, write_table, write_trace_csv, OutputFiles,
};

#[derive(Debug, Clone, Serialize)]
pub struct TraceSummary {
    pub regime: Regime,
    pub clamp: f64,
    pub rounds: usize,
    pub outcome: TrialOutcome,
    pub final_expected_value: f64,
    pub final_expected_growth: f64,
}

impl From<&TrialTrace> for TraceSummary {
    fn from(trace: &TrialTrace) -> Self {
        let result = trace.final_result();
        Self {
            regime: trace.regime,
            clamp: trace.clamp,
            rounds: result.rounds,
            outcome: result.outcome,
            final_expected_value: result.expected_value,
            final_expected_growth: result.expected_growth,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentSummary {
    pub config: RunConfig,
    pub runtime_s: f64,
    pub traces: Vec<TraceSummary>,
    pub cells: Vec<MonteCarloSummary>,
    pub outputs: OutputFiles,
    #[serde(skip)]
    pub table: String,
}

/// Run traced trials then the clamp sweep on one seeded stream and write
/// every enabled output under a fresh run directory in `output_base`.
pub fn run_experiment(config: &RunConfig, output_base: &Path) -> anyhow::Result<ExperimentSummary> {
    config.validate()?;
    let output_base = resolve_output_base_dir(output_base);
    let output_dir = create_timestamped_run_dir(&output_base)?;
    let mut outputs = OutputFiles::new(output_dir.clone());

    let start = Instant::now();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let traces = config
        .trace_configs()
        .iter()
        .map(|trial| run_traced_trial(trial, &mut rng))
        .collect::<Result<Vec<_>, _>>()
        .context("traced trial failed")?;
    for trace in &traces {
        info!(
            clamp = trace.clamp,
            rounds = trace.len().saturating_sub(1),
            outcome = ?trace.outcome,
            "traced trial complete"
        );
    }

    let result = run_clamp_sweep_with(&config.sweep_config(), &mut rng)
        .context("clamp sweep failed")?;
    let runtime_s = start.elapsed().as_secs_f64();
    info!(runtime_s, "simulation finished");

    let table = report::format_table(&result);
    write_outputs(config, &traces, &result, &table, &mut outputs)?;

    let summary = ExperimentSummary {
        config: config.clone(),
        runtime_s,
        traces: traces.iter().map(TraceSummary::from).collect(),
        cells: result.cells().copied().collect(),
        outputs,
        table,
    };
    write_summary_json(&summary.outputs.summary_path, &summary)?;

    Ok(summary)
}

fn write_outputs(
    config: &RunConfig,
    traces: &[TrialTrace],
    result: &ClampSweepResult,
    table: &str,
    outputs: &mut OutputFiles,
) -> anyhow::Result<()> {
    let dir = outputs.output_dir.clone();

    if config.write_table {
        let path = dir.join("sweep_table.txt");
        write_table(&path, table)?;
        outputs.table_path = Some(path);
    }

    if config.write_csv {
        let path = dir.join("monte_carlo_risk.csv");
        write_sweep_csv(&path, result)?;
        outputs.sweep_csv_path = Some(path);

        for trace in traces {
            let path = dir.join(trace_csv_name(trace.clamp));
            write_trace_csv(&path, trace)?;
            outputs.trace_csv_paths.push(path);
        }
    }

    if config.write_plots {
        if !traces.is_empty() {
            let path = dir.join("trajectories.svg");
            plot::plot_traces(traces, &path)?;
            outputs.trajectory_plot_path = Some(path);
        }

        let path = dir.join("sweep_means.svg");
        plot::plot_sweep(result, &path)?;
        outputs.sweep_plot_path = Some(path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> RunConfig {
        RunConfig {
            seed: 11,
            samples: 3,
            clamp_low: 8,
            clamp_high: 11,
            regimes: vec![Regime::Static, Regime::Dynamic],
            trace_clamps: vec![0.5, 1.0],
            ..RunConfig::default()
        }
    }

    #[test]
    fn experiment_writes_every_enabled_output() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run_experiment(&tiny_config(), dir.path()).unwrap();

        assert!(summary.outputs.output_dir.starts_with(dir.path()));
        assert!(summary.outputs.summary_path.is_file());
        assert!(summary.outputs.table_path.as_ref().unwrap().is_file());
        assert!(summary.outputs.sweep_csv_path.as_ref().unwrap().is_file());
        assert_eq!(summary.outputs.trace_csv_paths.len(), 2);
        assert!(summary.outputs.trajectory_plot_path.as_ref().unwrap().is_file());
        assert!(summary.outputs.sweep_plot_path.as_ref().unwrap().is_file());

        assert_eq!(summary.cells.len(), 2 * 3);
        assert_eq!(summary.traces.len(), 2);
        assert!(summary.table.starts_with("Type 1 Results:\nclamp: [0.8, 0.9, 1.0]\n"));
    }

    #[test]
    fn same_seed_gives_same_results() {
        let config = RunConfig {
            write_plots: false,
            ..tiny_config()
        };
        let dir = tempfile::tempdir().unwrap();
        let a = run_experiment(&config, dir.path()).unwrap();
        let b = run_experiment(&config, dir.path()).unwrap();

        assert_ne!(a.outputs.output_dir, b.outputs.output_dir);
        assert_eq!(a.table, b.table);
        assert_eq!(a.cells, b.cells);
        assert!(a.outputs.sweep_plot_path.is_none());
    }

    #[test]
    fn disabled_outputs_are_skipped() {
        let config = RunConfig {
            write_csv: false,
            write_plots: false,
            trace_clamps: Vec::new(),
            ..tiny_config()
        };
        let dir = tempfile::tempdir().unwrap();
        let summary = run_experiment(&config, dir.path()).unwrap();

        assert!(summary.traces.is_empty());
        assert!(summary.outputs.sweep_csv_path.is_none());
        assert!(summary.outputs.trace_csv_paths.is_empty());
        assert!(summary.outputs.table_path.is_some());
    }

    #[test]
    fn invalid_config_creates_nothing() {
        let config = RunConfig {
            samples: 0,
            ..tiny_config()
        };
        let dir = tempfile::tempdir().unwrap();
        assert!(run_experiment(&config, dir.path()).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
