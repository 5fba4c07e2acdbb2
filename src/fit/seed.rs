//! Starting point for the solver.
//!
//! Heuristic (deterministic, always inside the box):
//! - `T_inf` from the last observed value
//! - `k_i` split the initial deviation `y[0] - T_inf` evenly
//! - `tau_i` spread geometrically across each term's tau range, fastest first

use crate::error::AppError;
use crate::fit::bounds::ParamBounds;
use crate::models::ExponentialModel;

/// Fallback span (seconds) when a tau bound is open-ended.
const OPEN_TAU_SPAN: f64 = 1e3;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max >= min) {
        return Err(AppError::invalid_input(format!(
            "Invalid log range: min={min}, max={max} (must be finite, >0, and max>=min)."
        )));
    }
    if steps < 2 {
        return Err(AppError::invalid_input("Log range steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// Heuristic initial guess for `values` observed over time.
pub fn initial_guess(
    model: ExponentialModel,
    values: &[f64],
    bounds: &ParamBounds,
) -> Result<Vec<f64>, AppError> {
    let (Some(&first), Some(&last)) = (values.first(), values.last()) else {
        return Err(AppError::invalid_input("Cannot seed a fit without data."));
    };
    let order = model.order();
    let mut p = vec![0.0; model.param_count()];

    p[model.t_inf_index()] = last;
    let deviation = first - last;
    for i in 0..order {
        p[model.k_index(i)] = deviation / order as f64;
    }

    for i in 0..order {
        let j = model.tau_index(i);
        let lo = bounds.lower[j];
        let hi = if bounds.upper[j].is_finite() {
            bounds.upper[j]
        } else {
            lo * OPEN_TAU_SPAN
        };
        // Interior points of an (order+2)-point log grid over the term's range.
        let grid = log_space(lo, hi, order + 2)?;
        p[j] = grid[i + 1];
    }

    bounds.clamp(&mut p);
    Ok(p)
}
