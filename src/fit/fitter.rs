//! Fit the thermal model to one time series.
//!
//! Given:
//! - times `t_i` (seconds) and observed values `y_i`, all present and finite
//! - a model order and the caller's bounds
//!
//! we:
//! - broadcast the bounds once into a per-parameter box
//! - seed (or validate the caller's seed) inside the box
//! - run the selected least-squares back-end
//! - report parameters, optional standard errors and the RMSE

use tracing::debug;

use crate::domain::{FittedModel, SolverKind};
use crate::error::AppError;
use crate::fit::bounds::BoundsConfig;
use crate::fit::seed::initial_guess;
use crate::fit::solver::{CurveProblem, SolverSettings, solver_for};
use crate::models::{DEFAULT_ORDER, ExponentialModel};

/// Options controlling a single fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    /// Number of exponential terms.
    pub order: usize,
    pub bounds: BoundsConfig,
    /// Starting point in model layout; must lie inside the bounds.
    pub initial_guess: Option<Vec<f64>>,
    pub solver: SolverKind,
    pub settings: SolverSettings,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            bounds: BoundsConfig::default(),
            initial_guess: None,
            solver: SolverKind::default(),
            settings: SolverSettings::default(),
        }
    }
}

/// Fit `T(t) = T_inf + Σ k_i·exp(-t/tau_i)` to `(time, values)`.
pub fn fit(time: &[f64], values: &[f64], opts: &FitOptions) -> Result<FittedModel, AppError> {
    if time.len() != values.len() {
        return Err(AppError::invalid_input(format!(
            "Time and value lengths differ ({} vs {}).",
            time.len(),
            values.len()
        )));
    }
    if time.is_empty() {
        return Err(AppError::invalid_input("No data points to fit."));
    }
    if opts.order == 0 {
        return Err(AppError::invalid_input("Model order must be positive."));
    }
    if time.iter().chain(values).any(|v| !v.is_finite()) {
        return Err(AppError::invalid_input(
            "Fit input contains absent or non-finite values; interpolate or drop them first.",
        ));
    }

    let model = ExponentialModel::new(opts.order);
    let bounds = opts.bounds.expand(model)?;

    let x0 = match &opts.initial_guess {
        Some(p0) => {
            if p0.len() != model.param_count() {
                return Err(AppError::invalid_input(format!(
                    "Initial guess has {} parameters, model order {} needs {}.",
                    p0.len(),
                    opts.order,
                    model.param_count()
                )));
            }
            if !bounds.contains(p0) {
                return Err(AppError::invalid_input("Initial guess lies outside the bounds."));
            }
            p0.clone()
        }
        None => initial_guess(model, values, &bounds)?,
    };

    let problem = CurveProblem { model, time, values };
    let solver = solver_for(opts.solver);
    let out = solver.solve(&problem, &x0, &bounds, &opts.settings)?;

    if !out.converged {
        return Err(AppError::divergence(format!(
            "{} did not converge within {} iterations.",
            solver.name(),
            opts.settings.max_iter
        )));
    }
    if !out.cost.is_finite() {
        return Err(AppError::divergence("Fit produced a non-finite residual."));
    }

    let rmse = (out.cost / time.len() as f64).sqrt();
    debug!(
        solver = solver.name(),
        order = opts.order,
        iterations = out.iterations,
        rmse,
        "fit converged"
    );

    Ok(FittedModel {
        order: opts.order,
        params: out.params,
        uncertainties: out.uncertainties,
        rmse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::noisy_curve;
    use crate::error::ErrorKind;

    fn grid(n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * step).collect()
    }

    #[test]
    fn recovers_single_exponential_from_noisy_data() {
        let truth = [50.0, -10.0, 100.0];
        let time = grid(601, 2.0);
        let values = noisy_curve(1, &truth, &time, 0.05, 42);

        let opts = FitOptions {
            order: 1,
            ..FitOptions::default()
        };
        let m = fit(&time, &values, &opts).unwrap();

        for (a, b) in m.params.iter().zip(truth.iter()) {
            assert!((a - b).abs() <= 0.05 * b.abs(), "{a} vs {b}");
        }
        assert!(m.rmse > 0.03 && m.rmse < 0.08, "rmse={}", m.rmse);
        let unc = m.uncertainties.unwrap();
        assert!(unc.iter().all(|u| u.is_finite() && *u > 0.0));
    }

    #[test]
    fn recovers_two_exponentials_from_exact_data() {
        let truth = [53.0, -8.0, -13.0, 60.0, 320.0];
        let time = grid(751, 4.0);
        let model = ExponentialModel::new(2);
        let values: Vec<f64> = time.iter().map(|&t| model.eval(t, &truth)).collect();

        let m = fit(&time, &values, &FitOptions::default()).unwrap();
        for (a, b) in m.params.iter().zip(truth.iter()) {
            assert!((a - b).abs() <= 0.01 * b.abs(), "{a} vs {b}");
        }
        assert!(m.rmse < 1e-6);
    }

    #[test]
    fn short_series_pegs_fast_term_at_lower_tau_bound() {
        let time = [0.0, 10.0, 20.0, 30.0, 40.0, 50.0];
        let values = [0.0, 6.0, 6.5, 6.8, 7.0, 7.0];
        let m = fit(&time, &values, &FitOptions::default()).unwrap();

        let taus = m.taus();
        assert!(taus.iter().any(|&t| (t - 1.0).abs() < 1e-9));
        assert!(m.rmse < 0.1);
        assert!((m.t_inf() - 7.1).abs() < 0.05);
    }

    #[test]
    fn every_solver_keeps_results_inside_bounds() {
        let truth = [50.0, -10.0, 100.0];
        let time = grid(400, 3.0);
        let values = noisy_curve(1, &truth, &time, 0.1, 7);

        for solver in [SolverKind::Bounded, SolverKind::Unconstrained] {
            let opts = FitOptions {
                order: 1,
                bounds: BoundsConfig {
                    t_inf: (0.0, 120.0),
                    k: vec![(-8.0, 8.0)],
                    tau: vec![(1.0, 60.0)],
                },
                solver,
                ..FitOptions::default()
            };
            let m = fit(&time, &values, &opts).unwrap();
            assert!(m.ks()[0] >= -8.0 && m.ks()[0] <= 8.0);
            assert!(m.taus()[0] >= 1.0 && m.taus()[0] <= 60.0);
            assert_eq!(m.uncertainties.is_some(), solver == SolverKind::Bounded);
        }
    }

    #[test]
    fn default_order_fits_single_time_constant_data() {
        // Two terms on one-term data leave a flat tau_1 ≈ tau_2 valley.
        let truth = [50.0, -10.0, 100.0];
        let time = grid(601, 2.0);
        for seed in [1, 3, 7, 11, 19] {
            let values = noisy_curve(1, &truth, &time, 0.05, seed);
            let m = fit(&time, &values, &FitOptions::default())
                .unwrap_or_else(|e| panic!("seed {seed}: {e}"));
            assert!((m.t_inf() - 50.0).abs() < 0.5, "seed {seed}: T_inf={}", m.t_inf());
            assert!(m.rmse < 0.08, "seed {seed}: rmse={}", m.rmse);
        }
    }

    #[test]
    fn zero_signal_fits_to_zero_without_failing() {
        let time = grid(100, 1.0);
        let values = vec![0.0; 100];
        let m = fit(&time, &values, &FitOptions::default()).unwrap();
        assert!(m.t_inf().abs() < 1e-12);
        assert!(m.ks().iter().all(|k| k.abs() < 1e-12));
        assert_eq!(m.rmse, 0.0);
    }

    #[test]
    fn rejects_malformed_input() {
        let opts = FitOptions::default();
        let err = fit(&[0.0, 1.0], &[1.0], &opts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = fit(&[], &[], &opts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = fit(&[0.0, 1.0], &[1.0, f64::NAN], &opts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let bad_bounds = FitOptions {
            bounds: BoundsConfig {
                t_inf: (10.0, 0.0),
                ..BoundsConfig::default()
            },
            ..FitOptions::default()
        };
        let err = fit(&[0.0, 1.0], &[1.0, 2.0], &bad_bounds).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let outside = FitOptions {
            order: 1,
            initial_guess: Some(vec![50.0, -10.0, 10_000.0]),
            ..FitOptions::default()
        };
        let err = fit(&[0.0, 1.0], &[1.0, 2.0], &outside).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn exhausted_budget_is_divergence() {
        let truth = [50.0, -10.0, -5.0, 30.0, 400.0];
        let time = grid(500, 4.0);
        let values = noisy_curve(2, &truth, &time, 0.05, 3);
        let opts = FitOptions {
            settings: SolverSettings {
                max_iter: 1,
                ..SolverSettings::default()
            },
            ..FitOptions::default()
        };
        let err = fit(&time, &values, &opts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FitDivergence);
    }
}
