//! Dense least squares solver.
//!
//! Two callers solve small linear systems here:
//! - the Levenberg–Marquardt step `(JᵀJ + λD) δ = -Jᵀr` (square, often
//!   ill-conditioned when a time constant hits its bound)
//! - the straight-line regression behind thermal camera correction (tall)
//!
//! We use SVD for both so that tall and nearly singular systems are handled
//! the same way. (Nalgebra's `QR::solve` is intended for square systems and
//! panics for non-square matrices.) Parameter counts are tiny (≤ 2·order+1),
//! so SVD cost is irrelevant.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Moore–Penrose pseudo-inverse of a symmetric positive semi-definite matrix.
///
/// Used for the parameter covariance `(JᵀJ)⁻¹`; directions with no curvature
/// (e.g. a time constant whose amplitude is zero) get zero variance instead
/// of blowing up.
pub fn pseudo_inverse(a: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let scale = a.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);
    a.clone()
        .pseudo_inverse(1e-12 * scale)
        .ok()
        .filter(|m| m.iter().all(|v| v.is_finite()))
}

/// Ordinary least squares line `y = gain·x + offset`.
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let design = DMatrix::from_fn(x.len(), 2, |i, j| if j == 0 { x[i] } else { 1.0 });
    let rhs = DVector::from_column_slice(y);
    let beta = solve_least_squares(&design, &rhs)?;
    Some((beta[0], beta[1]))
}
