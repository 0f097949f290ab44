use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use structural_risk::{ClampSweepResult, TrialTrace};

use crate::report::{fmt_clamp, fmt_sci};

pub fn workspace_root_dir() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .join("../..")
        .canonicalize()
        .unwrap_or_else(|_| manifest_dir.join("../.."))
}

pub fn default_output_base_dir() -> PathBuf {
    workspace_root_dir().join("output-structural-risk")
}

/// Relative paths are resolved from the workspace root.
pub fn resolve_output_base_dir(requested: &Path) -> PathBuf {
    if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        workspace_root_dir().join(requested)
    }
}

pub fn create_timestamped_run_dir(base_dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(base_dir).with_context(|| {
        format!(
            "failed to create output base directory {}",
            base_dir.display()
        )
    })?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let mut run_dir = base_dir.join(&timestamp);
    let mut counter = 1_u32;

    while run_dir.exists() {
        run_dir = base_dir.join(format!("{timestamp}-{counter:02}"));
        counter += 1;
    }

    fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create run directory {}", run_dir.display()))?;
    Ok(run_dir)
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputFiles {
    pub output_dir: PathBuf,
    pub summary_path: PathBuf,
    pub table_path: Option<PathBuf>,
    pub sweep_csv_path: Option<PathBuf>,
    pub trace_csv_paths: Vec<PathBuf>,
    pub trajectory_plot_path: Option<PathBuf>,
    pub sweep_plot_path: Option<PathBuf>,
}

impl OutputFiles {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            summary_path: output_dir.join("summary.json"),
            output_dir,
            table_path: None,
            sweep_csv_path: None,
            trace_csv_paths: Vec::new(),
            trajectory_plot_path: None,
            sweep_plot_path: None,
        }
    }
}

pub fn trace_csv_name(clamp: f64) -> String {
    format!("trace_clamp_{}.csv", fmt_clamp(clamp))
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub fn write_table(path: &Path, table: &str) -> anyhow::Result<()> {
    ensure_parent(path)?;
    fs::write(path, table).with_context(|| format!("failed to write table {}", path.display()))
}

/// One header row of clamps, then an `EV type i` and an `EGR type i` row
/// per swept regime.
pub fn write_sweep_csv(path: &Path, result: &ClampSweepResult) -> anyhow::Result<()> {
    ensure_parent(path)?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open CSV path {}", path.display()))?;

    let mut header = vec!["clamp".to_string()];
    header.extend(result.clamps.iter().map(|&clamp| fmt_clamp(clamp)));
    writer.write_record(&header)?;

    for sweep in &result.regimes {
        let selector = sweep.regime.selector();

        let mut ev_row = vec![format!("EV type {selector}")];
        ev_row.extend(sweep.mean_expected_value().into_iter().map(fmt_sci));
        writer.write_record(&ev_row)?;

        let mut egr_row = vec![format!("EGR type {selector}")];
        egr_row.extend(sweep.mean_expected_growth().into_iter().map(fmt_sci));
        writer.write_record(&egr_row)?;
    }

    writer.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct TraceRow {
    round: usize,
    expected_value: f64,
    expected_growth: f64,
}

pub fn write_trace_csv(path: &Path, trace: &TrialTrace) -> anyhow::Result<()> {
    ensure_parent(path)?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open CSV path {}", path.display()))?;

    for ((&round, &expected_value), &expected_growth) in trace
        .rounds
        .iter()
        .zip(&trace.expected_value)
        .zip(&trace.expected_growth)
    {
        writer.serialize(TraceRow {
            round,
            expected_value,
            expected_growth,
        })?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_summary_json<T: Serialize>(path: &Path, summary: &T) -> anyhow::Result<()> {
    ensure_parent(path)?;

    let data = serde_json::to_string_pretty(summary)?;
    fs::write(path, data)
        .with_context(|| format!("failed to write summary {}", path.display()))?;
    Ok(())
}
