//! Throughput estimation from cumulative work counters.
//!
//! A counter column (`CPU0_work_done`, ...) counts completed work items since
//! the start of the run. Its finite difference against time is an ops/second
//! sample; pooling the samples of every matching column answers "how much
//! work did the whole machine do per second", with a t-based confidence
//! interval for the mean.

use tracing::{debug, warn};

use crate::domain::{ColumnRole, ColumnSchema, ThroughputEstimate, TimeSeries, WORK_DONE_PATTERN};
use crate::error::AppError;
use crate::math::stats::{mean, sample_std, student_t_quantile};

/// Default significance level of the confidence interval.
pub const DEFAULT_ALPHA: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputOptions {
    /// Regular expression selecting counter columns.
    pub pattern: String,
    pub alpha: f64,
    /// Remove non-finite rates (zero time steps) before pooling.
    pub drop_inf: bool,
}

impl Default for ThroughputOptions {
    fn default() -> Self {
        Self {
            pattern: WORK_DONE_PATTERN.to_string(),
            alpha: DEFAULT_ALPHA,
            drop_inf: false,
        }
    }
}

/// Finite-difference rate `Δcounter / Δtime`, `n - 1` values for `n` samples.
pub fn ops_per_sec(time: &[f64], counter: &[f64], drop_inf: bool) -> Result<Vec<f64>, AppError> {
    if time.len() != counter.len() {
        return Err(AppError::invalid_input(format!(
            "Time and counter lengths differ ({} vs {}).",
            time.len(),
            counter.len()
        )));
    }
    if time.len() < 2 {
        return Err(AppError::invalid_input(
            "Throughput needs at least two counter samples.",
        ));
    }
    let rates = time
        .windows(2)
        .zip(counter.windows(2))
        .map(|(t, c)| (c[1] - c[0]) / (t[1] - t[0]));
    Ok(if drop_inf {
        rates.filter(|r| r.is_finite()).collect()
    } else {
        rates.collect()
    })
}

/// Rates of one column of `series`, using only rows where the counter is present.
pub fn column_ops_per_sec(series: &TimeSeries, column: &str, drop_inf: bool) -> Result<Vec<f64>, AppError> {
    let (t, c) = series.present_pairs(column)?;
    ops_per_sec(&t, &c, drop_inf)
}

/// Sample mean and half-width of its `(1 - alpha)` confidence interval:
/// `t_(1-alpha/2, n-1) · s / sqrt(n)`.
///
/// Non-finite samples (rates over a zero time step) are rejected; pass
/// `drop_inf = true` to `ops_per_sec` to remove them first.
pub fn sample_mean_est(sample: &[f64], alpha: f64) -> Result<ThroughputEstimate, AppError> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(AppError::invalid_input(format!(
            "Significance level must lie in (0, 1), got {alpha}."
        )));
    }
    if let Some(i) = sample.iter().position(|v| !v.is_finite()) {
        return Err(AppError::invalid_input(format!(
            "Sample value {i} is {}; repeated time stamps need drop_inf.",
            sample[i]
        )));
    }
    let (Some(m), Some(sd)) = (mean(sample), sample_std(sample)) else {
        return Err(AppError::invalid_input(format!(
            "Confidence interval needs at least two samples, got {}.",
            sample.len()
        )));
    };
    let n = sample.len() as f64;
    let t = student_t_quantile(1.0 - alpha / 2.0, n - 1.0).ok_or_else(|| {
        AppError::invalid_input(format!("No t quantile for alpha={alpha}, n={n}."))
    })?;
    Ok(ThroughputEstimate {
        mean: m,
        half_width: t * sd / n.sqrt(),
    })
}

/// Pooled throughput over every column matching `opts.pattern`.
pub fn ops_est(series: &TimeSeries, opts: &ThroughputOptions) -> Result<ThroughputEstimate, AppError> {
    let schema = ColumnSchema::with_throughput(&opts.pattern)?;
    let columns = schema.resolve(series, ColumnRole::ThroughputCounter);
    if columns.is_empty() {
        return Err(AppError::invalid_input(format!(
            "No column of '{}' matches throughput pattern '{}'.",
            series.name, opts.pattern
        )));
    }

    let mut pooled = Vec::new();
    for name in &columns {
        let col = series.require_column(name)?;
        if col.present_count() < 2 {
            warn!(series = %series.name, column = %name, "counter has fewer than two samples, skipped");
            continue;
        }
        pooled.extend(column_ops_per_sec(series, name, opts.drop_inf)?);
    }
    debug!(series = %series.name, columns = columns.len(), samples = pooled.len(), "pooled throughput");
    sample_mean_est(&pooled, opts.alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Column;
    use crate::error::ErrorKind;

    #[test]
    fn rate_is_finite_difference() {
        let r = ops_per_sec(&[0.0, 1.0, 2.0], &[0.0, 10.0, 30.0], false).unwrap();
        assert_eq!(r, vec![10.0, 20.0]);
    }

    #[test]
    fn zero_time_step_is_kept_or_dropped() {
        let time = [0.0, 1.0, 1.0, 2.0];
        let counter = [0.0, 5.0, 7.0, 9.0];
        let kept = ops_per_sec(&time, &counter, false).unwrap();
        assert_eq!(kept.len(), 3);
        assert!(kept[1].is_infinite());

        let dropped = ops_per_sec(&time, &counter, true).unwrap();
        assert_eq!(dropped, vec![5.0, 2.0]);

        let err = ops_per_sec(&[0.0], &[0.0], false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn mean_estimate_matches_t_interval() {
        let est = sample_mean_est(&[1.0, 2.0, 3.0], 0.05).unwrap();
        assert!((est.mean - 2.0).abs() < 1e-12);
        // t_(0.975, 2) = 4.302652730, s = 1
        let expected = 4.302_652_730 / 3f64.sqrt();
        assert!((est.half_width - expected).abs() < 1e-6, "{}", est.half_width);
    }

    #[test]
    fn single_sample_is_rejected() {
        let err = sample_mean_est(&[5.0], 0.05).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(sample_mean_est(&[1.0, 2.0], 1.5).is_err());
    }

    #[test]
    fn infinite_rates_are_rejected_unless_dropped() {
        let time = [0.0, 1.0, 1.0, 2.0];
        let counter = [0.0, 5.0, 7.0, 9.0];
        let kept = ops_per_sec(&time, &counter, false).unwrap();
        let err = sample_mean_est(&kept, 0.05).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let dropped = ops_per_sec(&time, &counter, true).unwrap();
        let est = sample_mean_est(&dropped, 0.05).unwrap();
        assert!(est.half_width.is_finite() && est.half_width >= 0.0);
    }

    #[test]
    fn ops_est_pools_matching_columns() {
        let series = TimeSeries::new(
            "run",
            vec![0.0, 1.0, 2.0, 3.0],
            vec![
                Column::dense("CPU0_work_done", &[0.0, 10.0, 20.0, 30.0]),
                Column::new("CPU1_work_done", vec![None, Some(0.0), None, Some(40.0)]),
                Column::dense("CPU_0_temp", &[40.0, 41.0, 42.0, 43.0]),
            ],
        )
        .unwrap();
        // Pooled rates: [10, 10, 10] and [20].
        let est = ops_est(&series, &ThroughputOptions::default()).unwrap();
        assert!((est.mean - 12.5).abs() < 1e-12);
        assert!(est.half_width > 0.0);

        let none = ThroughputOptions {
            pattern: "^nothing$".into(),
            ..ThroughputOptions::default()
        };
        assert_eq!(ops_est(&series, &none).unwrap_err().kind(), ErrorKind::InvalidInput);
    }
}
