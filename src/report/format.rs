//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (the model string is asserted in tests)

use crate::domain::{FittedModel, MultiFitResult, ThroughputEstimate, Value};

/// Render a fitted model as a Gnuplot enhanced string, e.g.
/// `7.1 - 5.0⋅e^{-t/1.0} - 2.1⋅e^{-t/16.1}`.
///
/// Terms are sorted by ascending tau and every number is rounded to one
/// decimal. With `use_minutes` the time constants are shown in minutes.
pub fn format_model(model: &FittedModel, use_minutes: bool) -> String {
    let (var, scale) = if use_minutes { ("t_{min}", 60.0) } else { ("t", 1.0) };
    let mut out = format!("{:.1}", model.t_inf());
    for term in model.terms() {
        let sign = if term.k < 0.0 { '-' } else { '+' };
        out.push_str(&format!(
            " {sign} {:.1}⋅e^{{-{var}/{:.1}}}",
            term.k.abs(),
            term.tau / scale
        ));
    }
    out
}

/// Table with one line per multi-fit row.
pub fn format_multi_fit(result: &MultiFitResult, use_minutes: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {} (order {}) ===\n", result.label, result.order));
    out.push_str(
        format!(
            "{:<20} {:<16} {:>8} {:>22} {:>16} {}",
            "source", "column", "rmse", "ops", "Tinf", "model"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<20} {:-<16} {:-<8} {:-<22} {:-<16} {:-<5}", "", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in &result.rows {
        let ops = r.ops.map(fmt_ops).unwrap_or_else(|| "-".to_string());
        out.push_str(
            format!(
                "{:<20} {:<16} {:>8.3} {:>22} {:>16} {}",
                truncate(&r.source_name, 20),
                truncate(&r.column, 16),
                r.rmse,
                ops,
                format!("{:.1}", r.t_inf),
                format_model(&r.model, use_minutes)
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// One-line throughput summary for the `ops` subcommand.
pub fn format_throughput(name: &str, est: &ThroughputEstimate, alpha: f64) -> String {
    format!(
        "{name}: {est} ops/s ({:.0}% CI)",
        (1.0 - alpha) * 100.0
    )
}

fn fmt_ops(v: Value) -> String {
    match v {
        Value::Point(x) => format!("{x:.4e}"),
        Value::Measured { value, uncertainty } => format!("{value:.3e} ± {uncertainty:.1e}"),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
