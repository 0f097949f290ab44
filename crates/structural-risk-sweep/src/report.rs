//! Plain-text sweep table.

use std::fmt::Write as _;

use structural_risk::ClampSweepResult;

pub fn fmt_clamp(clamp: f64) -> String {
    format!("{clamp:.1}")
}

/// Two-decimal scientific notation with a signed, at least two-digit
/// exponent: `123.4` becomes `1.23e+02`.
pub fn fmt_sci(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let raw = format!("{value:.2e}");
    match raw.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => raw,
    }
}

fn join(values: impl Iterator<Item = String>) -> String {
    values.collect::<Vec<_>>().join(", ")
}

/// One block per regime: a `Type i Results:` heading, the clamp row, the
/// EV row and the EGR row, then a blank line.
pub fn format_table(result: &ClampSweepResult) -> String {
    let mut out = String::new();

    for sweep in &result.regimes {
        let _ = writeln!(out, "Type {} Results:", sweep.regime.selector());
        let _ = writeln!(
            out,
            "clamp: [{}]",
            join(sweep.clamps().into_iter().map(fmt_clamp))
        );
        let _ = writeln!(
            out,
            "ev: [{}]",
            join(sweep.mean_expected_value().into_iter().map(fmt_sci))
        );
        let _ = writeln!(
            out,
            "egr: [{}]",
            join(sweep.mean_expected_growth().into_iter().map(fmt_sci))
        );
        out.push('\n');
    }

    out
}
