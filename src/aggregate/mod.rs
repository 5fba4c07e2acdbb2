//! Multi-source, multi-column fitting.
//!
//! `multi_fit` fits every requested column of every source and collects the
//! results into one table. The work is split in two parallel phases:
//!
//! - throughput, once per source (shared by all rows of that source)
//! - fits, one job per (source, column)
//!
//! Rayon's indexed collect keeps the output in input order no matter which
//! job finishes first. The first failing job in that order aborts the run.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{
    ColumnRole, ColumnSchema, FittedModel, MultiFitResult, MultiFitRow, ThroughputEstimate, TimeSeries,
    Value,
};
use crate::error::AppError;
use crate::fit::{FitOptions, fit};
use crate::prep::{interpolate_values, subtract};
use crate::throughput::{ThroughputOptions, ops_est};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiFitOptions {
    /// Overrides every row's source name and the result label.
    pub name: Option<String>,
    /// Reference column subtracted from each target before fitting.
    pub subtract: Option<String>,
    /// Report value±uncertainty cells instead of plain numbers.
    pub use_measurements: bool,
    /// Order, bounds and solver of each fit.
    pub fit: FitOptions,
    /// Throughput estimation; `None` leaves `ops` empty.
    pub throughput: Option<ThroughputOptions>,
}

/// Fit `columns` of every source.
pub fn multi_fit(
    sources: &[TimeSeries],
    columns: &[String],
    opts: &MultiFitOptions,
) -> Result<MultiFitResult, AppError> {
    if opts.use_measurements && !opts.fit.solver.provides_uncertainties() {
        return Err(AppError::configuration(format!(
            "Measurement output needs parameter uncertainties, which the {:?} solver does not \
             estimate.",
            opts.fit.solver
        )));
    }
    if sources.is_empty() || columns.is_empty() {
        return Err(AppError::invalid_input("multi_fit needs at least one source and one column."));
    }

    let ops: Vec<Option<ThroughputEstimate>> = match &opts.throughput {
        Some(tp) => sources
            .par_iter()
            .map(|s| source_ops(s, tp))
            .collect::<Vec<_>>()
            .into_iter()
            .collect::<Result<_, _>>()?,
        None => vec![None; sources.len()],
    };

    let jobs: Vec<(usize, &str)> = (0..sources.len())
        .flat_map(|i| columns.iter().map(move |c| (i, c.as_str())))
        .collect();

    let fitted: Vec<Result<FittedModel, AppError>> = jobs
        .par_iter()
        .map(|&(i, column)| fit_column(&sources[i], column, opts))
        .collect();

    let mut rows = Vec::with_capacity(jobs.len());
    for (&(i, column), model) in jobs.iter().zip(fitted) {
        let model = model?;
        let source_name = opts.name.clone().unwrap_or_else(|| sources[i].name.clone());
        rows.push(build_row(source_name, column, model, ops[i], opts.use_measurements)?);
    }

    let label = opts.name.clone().unwrap_or_else(|| {
        sources
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    });
    info!(label = %label, rows = rows.len(), "multi_fit finished");

    Ok(MultiFitResult {
        label,
        order: opts.fit.order,
        use_measurements: opts.use_measurements,
        rows,
    })
}

/// Throughput of one source. A source without counter columns gets `None`.
fn source_ops(series: &TimeSeries, opts: &ThroughputOptions) -> Result<Option<ThroughputEstimate>, AppError> {
    let schema = ColumnSchema::with_throughput(&opts.pattern)?;
    if schema.resolve(series, ColumnRole::ThroughputCounter).is_empty() {
        warn!(series = %series.name, pattern = %opts.pattern, "no throughput columns, ops left empty");
        return Ok(None);
    }
    ops_est(series, opts).map(Some)
}

/// Interpolate (and optionally baseline-subtract) one column, then fit it.
fn fit_column(series: &TimeSeries, column: &str, opts: &MultiFitOptions) -> Result<FittedModel, AppError> {
    let values = match &opts.subtract {
        Some(reference) => subtract(series, column, reference)?,
        None => interpolate_values(&series.time, &series.require_column(column)?.values)?,
    };

    let (t, y): (Vec<f64>, Vec<f64>) = series
        .time
        .iter()
        .zip(&values)
        .filter_map(|(&t, &v)| v.filter(|v| v.is_finite()).map(|v| (t, v)))
        .unzip();
    let dropped = values.len() - t.len();
    if dropped > 0 {
        warn!(series = %series.name, column, dropped, "rows without a value excluded from the fit");
    }

    fit(&t, &y, &opts.fit)
        .map_err(|e| AppError::new(e.kind(), format!("{} / {column}: {}", series.name, e.message())))
}

fn build_row(
    source_name: String,
    column: &str,
    model: FittedModel,
    ops: Option<ThroughputEstimate>,
    measured: bool,
) -> Result<MultiFitRow, AppError> {
    let m = model.model();
    let t_inf = model.param_value(m.t_inf_index(), measured)?;
    let k = (0..model.order)
        .map(|i| model.param_value(m.k_index(i), measured))
        .collect::<Result<Vec<Value>, _>>()?;
    let tau = (0..model.order)
        .map(|i| model.param_value(m.tau_index(i), measured))
        .collect::<Result<Vec<Value>, _>>()?;

    Ok(MultiFitRow {
        source_name,
        column: column.to_string(),
        rmse: model.rmse,
        ops: ops.map(|e| e.to_value(measured)),
        t_inf,
        k,
        tau,
        model,
    })
}
