use std::path::{Path, PathBuf};

use clap::Parser;
use structural_risk::Regime;
use structural_risk_sweep::config::RunConfig;
use structural_risk_sweep::run_experiment;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "structural_risk.json";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Expected value vs. expected growth rate under a clamped risk budget"
)]
struct Cli {
    /// JSON run configuration (defaults to ./structural_risk.json when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output base directory (relative paths are resolved from workspace root)
    #[arg(long, default_value = "output-structural-risk")]
    output: PathBuf,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Monte Carlo trials per sweep cell
    #[arg(long)]
    samples: Option<usize>,

    /// Lowest clamp step, clamp = step / 10
    #[arg(long)]
    clamp_low: Option<u32>,

    /// Exclusive upper clamp step
    #[arg(long)]
    clamp_high: Option<u32>,

    /// Regime to sweep: stochastic, static, dynamic or 0-2 (repeatable)
    #[arg(long)]
    regime: Vec<Regime>,

    /// Regime of the traced trials
    #[arg(long)]
    trace_regime: Option<Regime>,

    /// Fan each sweep cell out over this many random streams
    #[arg(long)]
    parallel_streams: Option<usize>,

    /// Skip SVG plots
    #[arg(long)]
    no_plots: bool,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RunConfig> {
    match path {
        Some(path) => RunConfig::from_json_file(path),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                RunConfig::from_json_file(default_path)
            } else {
                Ok(RunConfig::default())
            }
        }
    }
}

fn apply_overrides(cli: &Cli, cfg: &mut RunConfig) {
    if let Some(v) = cli.seed {
        cfg.seed = v;
    }
    if let Some(v) = cli.samples {
        cfg.samples = v;
    }
    if let Some(v) = cli.clamp_low {
        cfg.clamp_low = v;
    }
    if let Some(v) = cli.clamp_high {
        cfg.clamp_high = v;
    }
    if !cli.regime.is_empty() {
        cfg.regimes = cli.regime.clone();
    }
    if let Some(v) = cli.trace_regime {
        cfg.trace_regime = v;
    }
    if cli.parallel_streams.is_some() {
        cfg.parallel_streams = cli.parallel_streams;
    }
    if cli.no_plots {
        cfg.write_plots = false;
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.as_deref())?;
    apply_overrides(&cli, &mut cfg);
    info!(seed = cfg.seed, samples = cfg.samples, "starting run");

    let summary = run_experiment(&cfg, &cli.output)?;

    if cfg.write_table {
        print!("{}", summary.table);
    }
    println!("Runtime: {:.3} s", summary.runtime_s);
    println!("Run directory: {}", summary.outputs.output_dir.display());
    println!("Summary: {}", summary.outputs.summary_path.display());
    if let Some(path) = &summary.outputs.sweep_csv_path {
        println!("Sweep CSV: {}", path.display());
    }
    if let Some(path) = &summary.outputs.trajectory_plot_path {
        println!("Trajectory plot: {}", path.display());
    }
    if let Some(path) = &summary.outputs.sweep_plot_path {
        println!("Sweep plot: {}", path.display());
    }

    Ok(())
}
