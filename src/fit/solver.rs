//! Least-squares back-ends.
//!
//! Both strategies minimize `Σ (T(t_i) - y_i)^2` with Levenberg–Marquardt
//! steps `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr`:
//!
//! - `BoundedLm` projects every trial point onto the parameter box and
//!   freezes parameters pegged at a bound whose gradient points outward, so
//!   iterates never leave the box. At the solution it estimates the parameter
//!   covariance `s²·(JᵀJ)⁻¹` over the free parameters.
//! - `UnconstrainedLm` iterates freely and only clamps the final estimate into
//!   the box. It reports no uncertainties.
//!
//! Convergence (MINPACK style): relative cost reduction below `ftol`, relative
//! step below `xtol`, scaled gradient below `gtol`, or no downhill step left
//! at machine precision (λ saturates).

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::domain::SolverKind;
use crate::error::AppError;
use crate::fit::bounds::ParamBounds;
use crate::math::{pseudo_inverse, solve_least_squares};
use crate::models::ExponentialModel;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e16;

/// Iteration budget and tolerances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    pub max_iter: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iter: 500,
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
        }
    }
}

/// The thermal model against one observed series.
#[derive(Debug, Clone, Copy)]
pub struct CurveProblem<'a> {
    pub model: ExponentialModel,
    pub time: &'a [f64],
    pub values: &'a [f64],
}

impl CurveProblem<'_> {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Residual vector `T(t_i) - y_i`.
    pub fn residuals(&self, params: &[f64]) -> DVector<f64> {
        DVector::from_iterator(
            self.len(),
            self.time
                .iter()
                .zip(self.values)
                .map(|(&t, &y)| self.model.eval(t, params) - y),
        )
    }

    pub fn jacobian(&self, params: &[f64]) -> DMatrix<f64> {
        let p = self.model.param_count();
        let mut jac = DMatrix::<f64>::zeros(self.len(), p);
        let mut row = vec![0.0; p];
        for (i, &t) in self.time.iter().enumerate() {
            self.model.fill_jacobian_row(t, params, &mut row);
            for (j, &v) in row.iter().enumerate() {
                jac[(i, j)] = v;
            }
        }
        jac
    }

    /// Sum of squared residuals.
    pub fn cost(&self, params: &[f64]) -> f64 {
        self.residuals(params).norm_squared()
    }
}

/// Uniform result of every back-end.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    pub params: Vec<f64>,
    pub uncertainties: Option<Vec<f64>>,
    pub converged: bool,
    pub iterations: usize,
    /// Final sum of squared residuals.
    pub cost: f64,
}

/// A least-squares strategy.
pub trait LeastSquaresSolver {
    fn name(&self) -> &'static str;

    /// Whether `solve` fills `SolverOutput::uncertainties`.
    fn provides_uncertainties(&self) -> bool;

    fn solve(
        &self,
        problem: &CurveProblem<'_>,
        x0: &[f64],
        bounds: &ParamBounds,
        settings: &SolverSettings,
    ) -> Result<SolverOutput, AppError>;
}

/// Box-respecting projected Levenberg–Marquardt.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundedLm;

/// Classic Levenberg–Marquardt; bounds only applied to the final estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconstrainedLm;

/// Pick the back-end for `kind`.
pub fn solver_for(kind: SolverKind) -> &'static dyn LeastSquaresSolver {
    match kind {
        SolverKind::Bounded => &BoundedLm,
        SolverKind::Unconstrained => &UnconstrainedLm,
    }
}

impl LeastSquaresSolver for BoundedLm {
    fn name(&self) -> &'static str {
        "bounded-lm"
    }

    fn provides_uncertainties(&self) -> bool {
        true
    }

    fn solve(
        &self,
        problem: &CurveProblem<'_>,
        x0: &[f64],
        bounds: &ParamBounds,
        settings: &SolverSettings,
    ) -> Result<SolverOutput, AppError> {
        let run = levenberg_marquardt(problem, x0, Some(bounds), settings)?;
        let uncertainties = if run.converged {
            Some(standard_errors(problem, &run.params, run.cost, bounds))
        } else {
            None
        };
        Ok(SolverOutput {
            params: run.params,
            uncertainties,
            converged: run.converged,
            iterations: run.iterations,
            cost: run.cost,
        })
    }
}

impl LeastSquaresSolver for UnconstrainedLm {
    fn name(&self) -> &'static str {
        "lm"
    }

    fn provides_uncertainties(&self) -> bool {
        false
    }

    fn solve(
        &self,
        problem: &CurveProblem<'_>,
        x0: &[f64],
        bounds: &ParamBounds,
        settings: &SolverSettings,
    ) -> Result<SolverOutput, AppError> {
        let mut run = levenberg_marquardt(problem, x0, None, settings)?;
        if !bounds.contains(&run.params) {
            warn!(
                params = ?run.params,
                "unconstrained estimate left the parameter box; clamping"
            );
            bounds.clamp(&mut run.params);
            run.cost = problem.cost(&run.params);
        }
        Ok(SolverOutput {
            params: run.params,
            uncertainties: None,
            converged: run.converged,
            iterations: run.iterations,
            cost: run.cost,
        })
    }
}

struct LmRun {
    params: Vec<f64>,
    cost: f64,
    iterations: usize,
    converged: bool,
}

fn levenberg_marquardt(
    problem: &CurveProblem<'_>,
    x0: &[f64],
    bounds: Option<&ParamBounds>,
    settings: &SolverSettings,
) -> Result<LmRun, AppError> {
    let p = x0.len();
    let mut x = x0.to_vec();
    if let Some(b) = bounds {
        b.clamp(&mut x);
    }
    let mut r = problem.residuals(&x);
    let mut cost = r.norm_squared();
    if !cost.is_finite() {
        return Err(AppError::divergence("Non-finite residuals at the starting point."));
    }

    let mut lambda = LAMBDA_INIT;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < settings.max_iter {
        iterations += 1;
        if cost == 0.0 {
            converged = true;
            break;
        }

        let jac = problem.jacobian(&x);
        let jtj = jac.transpose() * &jac;
        let grad = jac.transpose() * &r;

        let free: Vec<usize> = (0..p)
            .filter(|&j| match bounds {
                Some(b) => !blocked_by_bound(b, j, x[j], grad[j]),
                None => true,
            })
            .collect();

        if scaled_gradient(&jtj, &grad, &free, cost) <= settings.gtol {
            converged = true;
            break;
        }

        // Inner loop: raise λ until a step lowers the cost.
        let mut accepted = false;
        while lambda <= LAMBDA_MAX {
            let Some(step) = damped_step(&jtj, &grad, &free, lambda) else {
                lambda *= 10.0;
                continue;
            };

            let mut trial = x.clone();
            for (fi, &j) in free.iter().enumerate() {
                trial[j] += step[fi];
            }
            if let Some(b) = bounds {
                b.clamp(&mut trial);
            }

            let r_trial = problem.residuals(&trial);
            let cost_trial = r_trial.norm_squared();
            if cost_trial.is_finite() && cost_trial < cost {
                let rel_reduction = (cost - cost_trial) / cost;
                let step_norm = trial
                    .iter()
                    .zip(&x)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
                    .sqrt();
                let x_norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();

                x = trial;
                r = r_trial;
                cost = cost_trial;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                accepted = true;

                if rel_reduction <= settings.ftol || step_norm <= settings.xtol * (x_norm + settings.xtol) {
                    converged = true;
                }
                break;
            }
            lambda *= 10.0;
        }

        if !accepted {
            // No downhill direction left at machine precision.
            converged = true;
            break;
        }
        if converged {
            break;
        }
    }

    if !x.iter().all(|v| v.is_finite()) {
        return Err(AppError::divergence("Solver produced non-finite parameters."));
    }

    debug!(iterations, cost, lambda, converged, "levenberg-marquardt finished");
    Ok(LmRun {
        params: x,
        cost,
        iterations,
        converged,
    })
}

/// A parameter on a bound is frozen when descent (`-grad`) would push it out.
fn blocked_by_bound(b: &ParamBounds, j: usize, xj: f64, gj: f64) -> bool {
    if b.lower[j] == b.upper[j] {
        return true;
    }
    (xj <= b.lower[j] && gj > 0.0) || (xj >= b.upper[j] && gj < 0.0)
}

/// `max_j |g_j| / (‖J_j‖·‖r‖)` over free parameters.
fn scaled_gradient(jtj: &DMatrix<f64>, grad: &DVector<f64>, free: &[usize], cost: f64) -> f64 {
    let r_norm = cost.sqrt();
    free.iter()
        .map(|&j| {
            let col_norm = jtj[(j, j)].sqrt();
            if col_norm == 0.0 || r_norm == 0.0 {
                0.0
            } else {
                grad[j].abs() / (col_norm * r_norm)
            }
        })
        .fold(0.0, f64::max)
}

/// Solve `(A + λ·D) δ = -g` restricted to the free parameters.
fn damped_step(jtj: &DMatrix<f64>, grad: &DVector<f64>, free: &[usize], lambda: f64) -> Option<DVector<f64>> {
    let m = free.len();
    if m == 0 {
        return None;
    }
    let max_diag = free.iter().map(|&j| jtj[(j, j)]).fold(0.0, f64::max);
    let floor = (1e-12 * max_diag).max(1e-300);

    let mut a = DMatrix::<f64>::zeros(m, m);
    let mut rhs = DVector::<f64>::zeros(m);
    for (fi, &j) in free.iter().enumerate() {
        for (fk, &k) in free.iter().enumerate() {
            a[(fi, fk)] = jtj[(j, k)];
        }
        a[(fi, fi)] += lambda * jtj[(j, j)].max(floor);
        rhs[fi] = -grad[j];
    }
    solve_least_squares(&a, &rhs)
}

/// Standard errors `sqrt(diag(s²·(JᵀJ)⁻¹))` for parameters not pegged at a
/// bound; pegged parameters report zero.
fn standard_errors(problem: &CurveProblem<'_>, params: &[f64], cost: f64, bounds: &ParamBounds) -> Vec<f64> {
    let p = params.len();
    let free: Vec<usize> = (0..p).filter(|&j| !bounds.is_pegged(j, params[j])).collect();
    let mut out = vec![0.0; p];
    if free.is_empty() {
        return out;
    }

    let jac = problem.jacobian(params);
    let jtj = jac.transpose() * &jac;
    let m = free.len();
    let sub = DMatrix::from_fn(m, m, |a, b| jtj[(free[a], free[b])]);
    let Some(cov) = pseudo_inverse(&sub) else {
        return out;
    };

    let dof = problem.len().saturating_sub(m).max(1);
    let s2 = cost / dof as f64;
    for (fi, &j) in free.iter().enumerate() {
        out[j] = (s2 * cov[(fi, fi)]).max(0.0).sqrt();
    }
    out
}
