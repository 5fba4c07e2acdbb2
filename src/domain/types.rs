//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - passed between interpolation, fitting and aggregation
//! - exported to JSON/CSV
//! - handed to external plot renderers

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::ExponentialModel;

/// Opaque scalar attached to a series as metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Text(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Text(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Float(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

/// One named value column; `None` marks an absent sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Build a fully populated column.
    pub fn dense(name: impl Into<String>, values: &[f64]) -> Self {
        Self::new(name, values.iter().map(|&v| Some(v)).collect())
    }

    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// A time column plus N value columns, all of the same length.
///
/// Time is in seconds and non-decreasing. A non-finite time entry stands for a
/// missing time stamp; construction tolerates it so ingest can report it, but
/// interpolation and fitting reject it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Display label (defaults to the source identifier).
    pub name: String,
    pub time: Vec<f64>,
    /// Value columns in source order.
    pub columns: Vec<Column>,
    pub metadata: BTreeMap<String, MetaValue>,
}

impl TimeSeries {
    /// Create a series, validating column lengths, name uniqueness and time order.
    pub fn new(name: impl Into<String>, time: Vec<f64>, columns: Vec<Column>) -> Result<Self, AppError> {
        let name = name.into();
        validate_time_order(&name, &time)?;
        for (i, c) in columns.iter().enumerate() {
            if c.values.len() != time.len() {
                return Err(AppError::invalid_input(format!(
                    "Column '{}' in '{name}' has {} values but the time column has {}.",
                    c.name,
                    c.values.len(),
                    time.len()
                )));
            }
            if columns[..i].iter().any(|o| o.name == c.name) {
                return Err(AppError::invalid_input(format!(
                    "Duplicate column '{}' in '{name}'.",
                    c.name
                )));
            }
        }
        Ok(Self {
            name,
            time,
            columns,
            metadata: BTreeMap::new(),
        })
    }

    /// Attach one metadata entry (builder style).
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Copy this series but replace its value columns.
    ///
    /// Name and metadata carry over; the time column is shared.
    pub fn with_columns(&self, columns: Vec<Column>) -> Result<Self, AppError> {
        let mut out = TimeSeries::new(self.name.clone(), self.time.clone(), columns)?;
        out.metadata = self.metadata.clone();
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Like `column`, but a missing column is an `InvalidInput` error.
    pub fn require_column(&self, name: &str) -> Result<&Column, AppError> {
        self.column(name).ok_or_else(|| {
            AppError::invalid_input(format!("Column '{name}' not found in '{}'.", self.name))
        })
    }

    /// Replace the values of an existing column or append a new one.
    pub fn set_column(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<(), AppError> {
        if values.len() != self.time.len() {
            return Err(AppError::invalid_input(format!(
                "Column '{name}' has {} values but the time column has {}.",
                values.len(),
                self.time.len()
            )));
        }
        match self.column_mut(name) {
            Some(c) => c.values = values,
            None => self.columns.push(Column::new(name, values)),
        }
        Ok(())
    }

    /// Time/value pairs of a column restricted to rows where both are present.
    pub fn present_pairs(&self, name: &str) -> Result<(Vec<f64>, Vec<f64>), AppError> {
        let col = self.require_column(name)?;
        let mut t = Vec::with_capacity(col.values.len());
        let mut y = Vec::with_capacity(col.values.len());
        for (&ti, vi) in self.time.iter().zip(col.values.iter()) {
            if let Some(v) = vi {
                if ti.is_finite() && v.is_finite() {
                    t.push(ti);
                    y.push(*v);
                }
            }
        }
        Ok((t, y))
    }
}

fn validate_time_order(name: &str, time: &[f64]) -> Result<(), AppError> {
    let mut prev = f64::NEG_INFINITY;
    for (i, &t) in time.iter().enumerate() {
        if !t.is_finite() {
            continue;
        }
        if t < prev {
            return Err(AppError::invalid_input(format!(
                "Time column of '{name}' is not sorted (row {i}: {t} < {prev})."
            )));
        }
        prev = t;
    }
    Ok(())
}

/// A numeric result cell: a plain number or a number with its uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Point(f64),
    Measured { value: f64, uncertainty: f64 },
}

impl Value {
    /// Central value regardless of variant.
    pub fn value(&self) -> f64 {
        match *self {
            Value::Point(v) => v,
            Value::Measured { value, .. } => value,
        }
    }

    pub fn uncertainty(&self) -> Option<f64> {
        match *self {
            Value::Point(_) => None,
            Value::Measured { uncertainty, .. } => Some(uncertainty),
        }
    }

    /// Compact rendering used in CSV cells (`v` or `v±u`).
    pub fn to_cell(&self) -> String {
        match *self {
            Value::Point(v) => format!("{v}"),
            Value::Measured { value, uncertainty } => format!("{value}±{uncertainty}"),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let precision = f.precision();
        match (*self, precision) {
            (Value::Point(v), Some(p)) => write!(f, "{v:.p$}"),
            (Value::Point(v), None) => write!(f, "{v}"),
            (Value::Measured { value, uncertainty }, Some(p)) => {
                write!(f, "{value:.p$} ± {uncertainty:.p$}")
            }
            (Value::Measured { value, uncertainty }, None) => write!(f, "{value} ± {uncertainty}"),
        }
    }
}

/// Result of fitting the thermal model to one column.
///
/// `params` layout is `[T_inf, k_1..k_order, tau_1..tau_order]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub order: usize,
    pub params: Vec<f64>,
    /// Standard errors parallel to `params`, when the solver estimates covariance.
    pub uncertainties: Option<Vec<f64>>,
    pub rmse: f64,
}

/// One exponential term `k·exp(-t/tau)` of a fitted model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpTerm {
    pub k: f64,
    pub tau: f64,
}

impl FittedModel {
    pub fn model(&self) -> ExponentialModel {
        ExponentialModel::new(self.order)
    }

    /// # Panics
    /// `t_inf`, `ks` and `taus` panic if `params` is shorter than
    /// `2*order + 1`; use [`FittedModel::check_layout`] on models built by hand
    /// or deserialized.
    pub fn t_inf(&self) -> f64 {
        self.params[0]
    }

    pub fn ks(&self) -> &[f64] {
        &self.params[1..=self.order]
    }

    pub fn taus(&self) -> &[f64] {
        &self.params[self.order + 1..]
    }

    /// `params` (and `uncertainties`, when present) match the model order.
    pub fn check_layout(&self) -> Result<(), AppError> {
        let expected = self.model().param_count();
        if self.order == 0 || self.params.len() != expected {
            return Err(AppError::invalid_input(format!(
                "Model of order {} needs {expected} parameters, has {}.",
                self.order,
                self.params.len()
            )));
        }
        if let Some(unc) = &self.uncertainties {
            if unc.len() != expected {
                return Err(AppError::invalid_input(format!(
                    "Model of order {} needs {expected} uncertainties, has {}.",
                    self.order,
                    unc.len()
                )));
            }
        }
        Ok(())
    }

    /// Exponential terms sorted by ascending tau (fastest first).
    pub fn terms(&self) -> Vec<ExpTerm> {
        let mut terms: Vec<ExpTerm> = self
            .ks()
            .iter()
            .zip(self.taus())
            .map(|(&k, &tau)| ExpTerm { k, tau })
            .collect();
        terms.sort_by(|a, b| a.tau.total_cmp(&b.tau));
        terms
    }

    pub fn predict(&self, t: f64) -> f64 {
        self.model().eval(t, &self.params)
    }

    /// Model values at the given times (raw+fit overlays for plotters).
    pub fn fitted_curve(&self, times: &[f64]) -> Vec<f64> {
        times.iter().map(|&t| self.predict(t)).collect()
    }

    /// Parameter `idx` as a result cell.
    ///
    /// With `measured = true` the uncertainty comes from the solver's standard
    /// errors; a fit without them is a configuration error.
    pub fn param_value(&self, idx: usize, measured: bool) -> Result<Value, AppError> {
        self.check_layout()?;
        let Some(&value) = self.params.get(idx) else {
            return Err(AppError::invalid_input(format!(
                "Parameter index {idx} out of range for order {}.",
                self.order
            )));
        };
        if !measured {
            return Ok(Value::Point(value));
        }
        let Some(unc) = &self.uncertainties else {
            return Err(AppError::configuration(
                "Parameter uncertainties requested but the solver did not estimate covariance; \
                 use the bounded solver.",
            ));
        };
        Ok(Value::Measured {
            value,
            uncertainty: unc[idx],
        })
    }
}

/// Mean throughput with the half-width of its confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThroughputEstimate {
    pub mean: f64,
    pub half_width: f64,
}

impl ThroughputEstimate {
    pub fn to_value(self, measured: bool) -> Value {
        if measured {
            Value::Measured {
                value: self.mean,
                uncertainty: self.half_width,
            }
        } else {
            Value::Point(self.mean)
        }
    }
}

impl std::fmt::Display for ThroughputEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4e} ± {:.4e}", self.mean, self.half_width)
    }
}

/// Least-squares back-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    /// Box-respecting projected Levenberg–Marquardt with covariance estimate.
    #[default]
    Bounded,
    /// Plain Levenberg–Marquardt; bounds only checked on the final estimate.
    Unconstrained,
}

impl SolverKind {
    pub fn provides_uncertainties(self) -> bool {
        matches!(self, SolverKind::Bounded)
    }
}

/// One aggregated row: a single (source, column) fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiFitRow {
    pub source_name: String,
    pub column: String,
    pub rmse: f64,
    /// Shared by every row of the same source.
    pub ops: Option<Value>,
    pub t_inf: Value,
    pub k: Vec<Value>,
    pub tau: Vec<Value>,
    pub model: FittedModel,
}

/// Consolidated results of `multi_fit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiFitResult {
    /// Display name of the whole set (plot title).
    pub label: String,
    pub order: usize,
    pub use_measurements: bool,
    /// Rows in source-major, column-minor input order.
    pub rows: Vec<MultiFitRow>,
}

/// `(label, T_inf, ops)` projection used for bar-style comparisons.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TinfSummary {
    pub label: String,
    pub t_inf: Value,
    pub ops: Option<Value>,
}

impl MultiFitResult {
    /// Replace the display label in place; rows are untouched.
    pub fn rename(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = label.into();
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Per-row T_inf and throughput, labelled `source` or `source column`
    /// when a source contributes several rows.
    pub fn tinf_table(&self) -> Vec<TinfSummary> {
        self.rows
            .iter()
            .map(|r| {
                let shared = self
                    .rows
                    .iter()
                    .filter(|o| o.source_name == r.source_name)
                    .count();
                let label = if shared > 1 {
                    format!("{} {}", r.source_name, r.column)
                } else {
                    r.source_name.clone()
                };
                TinfSummary {
                    label,
                    t_inf: r.t_inf,
                    ops: r.ops,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> TimeSeries {
        TimeSeries::new(
            "run",
            vec![0.0, 1.0, 2.0],
            vec![Column::new("a", vec![Some(1.0), None, Some(3.0)])],
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_length_mismatch_and_unsorted_time() {
        let err = TimeSeries::new("x", vec![0.0, 1.0], vec![Column::dense("a", &[1.0])]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);

        let err = TimeSeries::new("x", vec![1.0, 0.0], vec![]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);

        let err = TimeSeries::new(
            "x",
            vec![0.0],
            vec![Column::dense("a", &[1.0]), Column::dense("a", &[2.0])],
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[test]
    fn present_pairs_skips_absent_rows() {
        let (t, y) = series().present_pairs("a").unwrap();
        assert_eq!(t, vec![0.0, 2.0]);
        assert_eq!(y, vec![1.0, 3.0]);
        assert!(series().present_pairs("missing").is_err());
    }

    #[test]
    fn with_columns_keeps_name_and_metadata() {
        let s = series().with_metadata("board", "imx8");
        let d = s.with_columns(vec![Column::dense("b", &[0.0, 0.0, 0.0])]).unwrap();
        assert_eq!(d.name, "run");
        assert_eq!(d.metadata.get("board"), Some(&MetaValue::from("imx8")));
        assert!(d.column("a").is_none());
    }

    #[test]
    fn terms_are_sorted_by_tau() {
        let m = FittedModel {
            order: 2,
            params: vec![50.0, -3.0, -7.0, 300.0, 20.0],
            uncertainties: None,
            rmse: 0.0,
        };
        let terms = m.terms();
        assert_eq!(terms[0].tau, 20.0);
        assert_eq!(terms[0].k, -7.0);
        assert_eq!(terms[1].tau, 300.0);
    }

    #[test]
    fn param_value_without_uncertainties_is_configuration_error() {
        let m = FittedModel {
            order: 1,
            params: vec![50.0, -10.0, 100.0],
            uncertainties: None,
            rmse: 0.0,
        };
        assert_eq!(m.param_value(0, false).unwrap(), Value::Point(50.0));
        let err = m.param_value(0, true).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn param_value_rejects_inconsistent_layout() {
        let short = FittedModel {
            order: 2,
            params: vec![50.0, -10.0, 100.0],
            uncertainties: None,
            rmse: 0.0,
        };
        let err = short.param_value(0, false).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);

        let bad_unc = FittedModel {
            order: 1,
            params: vec![50.0, -10.0, 100.0],
            uncertainties: Some(vec![0.1]),
            rmse: 0.0,
        };
        let err = bad_unc.param_value(2, true).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);

        let ok = FittedModel {
            uncertainties: Some(vec![0.1, 0.2, 0.3]),
            ..bad_unc
        };
        assert!(ok.param_value(3, false).is_err());
        assert_eq!(
            ok.param_value(2, true).unwrap(),
            Value::Measured {
                value: 100.0,
                uncertainty: 0.3
            }
        );
    }

    #[test]
    fn value_display_respects_precision() {
        let v = Value::Measured {
            value: 2.0,
            uncertainty: 0.26,
        };
        assert_eq!(format!("{v:.1}"), "2.0 ± 0.3");
        assert_eq!(Value::Point(1.5).to_cell(), "1.5");
        assert_eq!(v.to_cell(), "2±0.26");
    }

    #[test]
    fn tinf_table_labels_shared_sources_by_column() {
        let model = FittedModel {
            order: 1,
            params: vec![50.0, -10.0, 100.0],
            uncertainties: None,
            rmse: 0.0,
        };
        assert!((model.fitted_curve(&[0.0])[0] - 40.0).abs() < 1e-12);
        let row = |source: &str, column: &str| MultiFitRow {
            source_name: source.into(),
            column: column.into(),
            rmse: 0.0,
            ops: None,
            t_inf: Value::Point(50.0),
            k: vec![Value::Point(-10.0)],
            tau: vec![Value::Point(100.0)],
            model: model.clone(),
        };
        let r = MultiFitResult {
            label: "x".into(),
            order: 1,
            use_measurements: false,
            rows: vec![row("a", "CPU_0_temp"), row("a", "CPU_1_temp"), row("b", "CPU_0_temp")],
        };
        let labels: Vec<String> = r.tinf_table().into_iter().map(|s| s.label).collect();
        assert_eq!(labels, vec!["a CPU_0_temp", "a CPU_1_temp", "b"]);
    }

    #[test]
    fn rename_touches_only_label() {
        let mut r = MultiFitResult {
            label: "a.csv".into(),
            order: 2,
            use_measurements: false,
            rows: vec![],
        };
        r.rename("CPU0").rename("CPU1");
        assert_eq!(r.label, "CPU1");
        assert!(r.is_empty());
    }
}
