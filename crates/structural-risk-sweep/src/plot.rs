use std::fs;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use structural_risk::{ClampSweepResult, TrialTrace};

use crate::report::fmt_clamp;

const PANEL_COLUMNS: usize = 3;
const PANEL_SIZE: (u32, u32) = (480, 360);
// Floor for the log-scaled sweep axis; a fully ruined clamp=1.0 EV mean is 0.
const LOG_FLOOR: f64 = 1e-3;

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// One panel per traced trial, three panels to a row.
pub fn plot_traces(traces: &[TrialTrace], path: &Path) -> anyhow::Result<()> {
    anyhow::ensure!(!traces.is_empty(), "no traced trials to plot");
    ensure_parent(path)?;

    let cols = traces.len().min(PANEL_COLUMNS);
    let rows = (traces.len() + cols - 1) / cols;
    let size = (PANEL_SIZE.0 * cols as u32, PANEL_SIZE.1 * rows as u32);

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let panels = root.split_evenly((rows, cols));
    for (panel, trace) in panels.iter().zip(traces) {
        draw_trace_panel(panel, trace)?;
    }

    root.present()?;
    Ok(())
}

fn draw_trace_panel(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    trace: &TrialTrace,
) -> anyhow::Result<()> {
    let max_round = trace.rounds.last().copied().unwrap_or(0).max(1) as f64;
    let max_value = trace
        .expected_value
        .iter()
        .chain(&trace.expected_growth)
        .copied()
        .filter(|v| v.is_finite())
        .fold(1.0_f64, f64::max);

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("Clamp: {}", fmt_clamp(trace.clamp)),
            ("sans-serif", 20).into_font(),
        )
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..max_round, 0.0..max_value * 1.05)?;

    chart.configure_mesh().x_desc("T").y_desc("V").draw()?;

    chart
        .draw_series(LineSeries::new(
            trace
                .rounds
                .iter()
                .zip(&trace.expected_value)
                .map(|(&t, &v)| (t as f64, v)),
            &BLUE,
        ))?
        .label("EV")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(2)));

    chart
        .draw_series(LineSeries::new(
            trace
                .rounds
                .iter()
                .zip(&trace.expected_growth)
                .map(|(&t, &v)| (t as f64, v)),
            &RED,
        ))?
        .label("EGR")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.7))
        .draw()?;

    Ok(())
}

/// Mean final values against clamp for every regime, log-scaled.
pub fn plot_sweep(result: &ClampSweepResult, path: &Path) -> anyhow::Result<()> {
    anyhow::ensure!(!result.clamps.is_empty(), "sweep has no clamps to plot");
    ensure_parent(path)?;

    let root = SVGBackend::new(path, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;

    let x_min = result.clamps.iter().copied().fold(f64::INFINITY, f64::min) - 0.05;
    let x_max = result
        .clamps
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max)
        + 0.05;

    let floored = |v: f64| if v.is_finite() { v.max(LOG_FLOOR) } else { LOG_FLOOR };
    let means = result
        .cells()
        .flat_map(|cell| [cell.mean_expected_value, cell.mean_expected_growth])
        .map(floored);
    let (y_min, y_max) = means.fold((f64::INFINITY, LOG_FLOOR), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let y_min = y_min.min(y_max) / 2.0;
    let y_max = y_max * 2.0;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Mean Final Value vs. Clamp (Log Scale)",
            ("sans-serif", 30).into_font(),
        )
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(x_min..x_max, (y_min..y_max).log_scale())?;

    chart
        .configure_mesh()
        .x_desc("Clamp")
        .y_desc("Mean final value")
        .draw()?;

    for (idx, sweep) in result.regimes.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        let selector = sweep.regime.selector();

        chart
            .draw_series(LineSeries::new(
                sweep
                    .cells
                    .iter()
                    .map(|cell| (cell.clamp, floored(cell.mean_expected_value))),
                color.stroke_width(2),
            ))?
            .label(format!("EV type {selector}"))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 25, y)], color.stroke_width(2))
            });

        chart
            .draw_series(LineSeries::new(
                sweep
                    .cells
                    .iter()
                    .map(|cell| (cell.clamp, floored(cell.mean_expected_growth))),
                color.stroke_width(1),
            ))?
            .label(format!("EGR type {selector}"))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 25, y)], color.stroke_width(1))
            });

        chart.draw_series(sweep.cells.iter().map(|cell| {
            Circle::new(
                (cell.clamp, floored(cell.mean_expected_growth)),
                3,
                color.filled(),
            )
        }))?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.7))
        .draw()?;

    root.present()?;
    Ok(())
}
