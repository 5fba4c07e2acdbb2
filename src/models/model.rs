//! Sum-of-exponentials thermal model.
//!
//! ```text
//! T(t) = T_inf + Σ_{i=1..order} k_i · exp(-t / tau_i)
//! ```
//!
//! Parameter vector layout (fixed; bounds and formatting depend on it):
//!
//! - index `0`: `T_inf`
//! - indices `1..=order`: `k_i`
//! - indices `order+1..=2*order`: `tau_i`
//!
//! The fitter relies on two primitive operations:
//! - evaluate `T(t)` for residuals and plots
//! - fill a Jacobian row `∂T/∂p` for the Levenberg–Marquardt normal equations

/// Default number of exponential terms.
pub const DEFAULT_ORDER: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialModel {
    order: usize,
}

impl ExponentialModel {
    pub fn new(order: usize) -> Self {
        Self { order }
    }

    pub fn order(self) -> usize {
        self.order
    }

    /// Number of parameters (`2*order + 1`).
    pub fn param_count(self) -> usize {
        2 * self.order + 1
    }

    pub fn t_inf_index(self) -> usize {
        0
    }

    /// Index of `k_i`, `i` counted from zero.
    pub fn k_index(self, i: usize) -> usize {
        1 + i
    }

    /// Index of `tau_i`, `i` counted from zero.
    pub fn tau_index(self, i: usize) -> usize {
        1 + self.order + i
    }

    /// Evaluate `T(t)`.
    pub fn eval(self, t: f64, params: &[f64]) -> f64 {
        let mut y = params[self.t_inf_index()];
        for i in 0..self.order {
            y += params[self.k_index(i)] * decay(t, params[self.tau_index(i)]);
        }
        y
    }

    /// Fill `out` with `∂T/∂p` at time `t`.
    ///
    /// # Panics
    /// Panics if `params` or `out` is shorter than `param_count()`.
    pub fn fill_jacobian_row(self, t: f64, params: &[f64], out: &mut [f64]) {
        out[self.t_inf_index()] = 1.0;
        for i in 0..self.order {
            let k = params[self.k_index(i)];
            let tau = params[self.tau_index(i)];
            let e = decay(t, tau);
            out[self.k_index(i)] = e;
            // d/dtau [k e^{-t/tau}] = k e^{-t/tau} t / tau^2
            out[self.tau_index(i)] = if tau > 0.0 { k * e * t / (tau * tau) } else { 0.0 };
        }
    }
}

impl Default for ExponentialModel {
    fn default() -> Self {
        Self::new(DEFAULT_ORDER)
    }
}

/// `exp(-t/tau)`; a non-positive tau contributes nothing.
fn decay(t: f64, tau: f64) -> f64 {
    if tau > 0.0 { (-t / tau).exp() } else { 0.0 }
}
