//! Synthetic thermobench runs generated from a known thermal model.
//!
//! A run mimics what the benchmark logger produces:
//! - one or more `CPU_<n>_temp` channels following the thermal model plus
//!   Gaussian noise, with occasional dropped samples
//! - an `ambient` channel (constant plus noise)
//! - sparse cumulative `CPU<n>_work_done` counters, one per core, each present
//!   only on every few rows
//!
//! Generation is fully determined by the seed.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Column, TimeSeries};
use crate::error::AppError;
use crate::models::ExponentialModel;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticRun {
    pub name: String,
    pub duration_s: f64,
    pub period_s: f64,
    pub order: usize,
    /// True model in `[T_inf, k.., tau..]` layout.
    pub params: Vec<f64>,
    pub noise_sd: f64,
    pub temp_channels: usize,
    pub ambient: f64,
    pub cores: usize,
    /// Mean work increments per second and core.
    pub ops_rate: f64,
    /// Relative standard deviation of the per-interval rate.
    pub ops_jitter: f64,
    /// Every `gap_every`-th temperature sample is dropped (0 disables).
    pub gap_every: usize,
    /// Counters are logged on every `work_every`-th row.
    pub work_every: usize,
    pub seed: u64,
}

impl Default for SyntheticRun {
    fn default() -> Self {
        Self {
            name: "synthetic".to_string(),
            duration_s: 1800.0,
            period_s: 1.0,
            order: 2,
            params: vec![53.0, -8.0, -13.0, 60.0, 320.0],
            noise_sd: 0.1,
            temp_channels: 2,
            ambient: 22.0,
            cores: 4,
            ops_rate: 5.5e7,
            ops_jitter: 0.01,
            gap_every: 7,
            work_every: 3,
            seed: 42,
        }
    }
}

/// Model values at `time` plus `N(0, noise_sd)` noise.
pub fn noisy_curve(order: usize, params: &[f64], time: &[f64], noise_sd: f64, seed: u64) -> Vec<f64> {
    let model = ExponentialModel::new(order);
    let mut rng = StdRng::seed_from_u64(seed);
    match Normal::new(0.0, noise_sd) {
        Ok(normal) => time
            .iter()
            .map(|&t| model.eval(t, params) + normal.sample(&mut rng))
            .collect(),
        Err(_) => time.iter().map(|&t| model.eval(t, params)).collect(),
    }
}

/// Build a full run as a `TimeSeries`.
pub fn generate_run(spec: &SyntheticRun) -> Result<TimeSeries, AppError> {
    if !(spec.period_s.is_finite() && spec.period_s > 0.0) {
        return Err(AppError::invalid_input("Synthetic period must be positive."));
    }
    if !(spec.duration_s.is_finite() && spec.duration_s >= spec.period_s) {
        return Err(AppError::invalid_input("Synthetic duration must cover at least one period."));
    }
    let model = ExponentialModel::new(spec.order);
    if spec.order == 0 || spec.params.len() != model.param_count() {
        return Err(AppError::invalid_input(format!(
            "Synthetic model of order {} needs {} parameters, got {}.",
            spec.order,
            model.param_count(),
            spec.params.len()
        )));
    }
    if !(spec.noise_sd >= 0.0 && spec.ops_jitter >= 0.0) {
        return Err(AppError::invalid_input("Noise levels must be non-negative."));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let unit = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::invalid_input(format!("Noise distribution error: {e}")))?;

    let n = (spec.duration_s / spec.period_s).floor() as usize + 1;
    let time: Vec<f64> = (0..n).map(|i| i as f64 * spec.period_s).collect();

    let mut columns = Vec::new();
    for c in 0..spec.temp_channels {
        // Channels differ slightly in steady state, as real cores do.
        let mut params = spec.params.clone();
        params[model.t_inf_index()] += 0.5 * c as f64;
        let values = time
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let noise = spec.noise_sd * unit.sample(&mut rng);
                let dropped = spec.gap_every > 0 && i > 0 && i + 1 < n && i % spec.gap_every == 0;
                (!dropped).then_some(model.eval(t, &params) + noise)
            })
            .collect();
        columns.push(Column::new(format!("CPU_{c}_temp"), values));
    }

    let ambient = time
        .iter()
        .map(|_| Some(spec.ambient + spec.noise_sd * unit.sample(&mut rng)))
        .collect();
    columns.push(Column::new("ambient", ambient));

    let work_every = spec.work_every.max(1);
    for core in 0..spec.cores {
        let mut counter = 0.0;
        let mut last_t = 0.0;
        // Offset each core so counters land on different rows.
        let phase = core % work_every;
        let values = time
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                if i % work_every != phase {
                    return None;
                }
                let dt = t - last_t;
                let rate = spec.ops_rate * (1.0 + spec.ops_jitter * unit.sample(&mut rng));
                counter += (rate * dt).max(0.0).round();
                last_t = t;
                Some(counter)
            })
            .collect();
        columns.push(Column::new(format!("CPU{core}_work_done"), values));
    }

    Ok(TimeSeries::new(spec.name.clone(), time, columns)?
        .with_metadata("synthetic", true)
        .with_metadata("seed", spec.seed as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let spec = SyntheticRun::default();
        let a = generate_run(&spec).unwrap();
        let b = generate_run(&spec).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn run_has_expected_layout() {
        let spec = SyntheticRun {
            duration_s: 60.0,
            cores: 2,
            temp_channels: 1,
            ..SyntheticRun::default()
        };
        let run = generate_run(&spec).unwrap();
        assert_eq!(run.len(), 61);
        let names: Vec<&str> = run.column_names().collect();
        assert_eq!(names, vec!["CPU_0_temp", "ambient", "CPU0_work_done", "CPU1_work_done"]);

        let temp = run.column("CPU_0_temp").unwrap();
        assert!(temp.values[7].is_none());
        assert!(temp.values[0].is_some() && temp.values[60].is_some());

        let work = run.column("CPU1_work_done").unwrap();
        assert!(work.values[0].is_none());
        assert!(work.values[1].is_some());
    }

    #[test]
    fn noiseless_curve_matches_model() {
        let time = [0.0, 10.0, 100.0];
        let v = noisy_curve(1, &[50.0, -10.0, 100.0], &time, 0.0, 1);
        assert!((v[0] - 40.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_parameter_count_mismatch() {
        let spec = SyntheticRun {
            params: vec![1.0, 2.0],
            ..SyntheticRun::default()
        };
        assert!(generate_run(&spec).is_err());
    }
}
