//! Parameter bounds and their broadcast to the model layout.
//!
//! Users give one `(lower, upper)` pair for `T_inf` and lists of pairs for the
//! `k` and `tau` groups. A list shorter than the model order repeats its last
//! pair for the remaining terms. The expansion happens once, before solving.

use crate::error::AppError;
use crate::models::ExponentialModel;

/// `(lower, upper)` pair.
pub type Bound = (f64, f64);

/// Default `T_inf` range (°C).
pub const DEFAULT_T_INF_BOUNDS: Bound = (0.0, 120.0);
/// Default amplitude range (°C).
pub const DEFAULT_K_BOUNDS: Bound = (-120.0, 120.0);
/// Default time constant range (seconds).
pub const DEFAULT_TAU_BOUNDS: Bound = (1.0, 60.0 * 60.0);

/// Bounds as supplied by the caller, before broadcasting.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundsConfig {
    pub t_inf: Bound,
    pub k: Vec<Bound>,
    pub tau: Vec<Bound>,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            t_inf: DEFAULT_T_INF_BOUNDS,
            k: vec![DEFAULT_K_BOUNDS],
            tau: vec![DEFAULT_TAU_BOUNDS],
        }
    }
}

/// Per-parameter box in model layout order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl BoundsConfig {
    /// Broadcast the groups onto the `2*order+1` parameter layout.
    pub fn expand(&self, model: ExponentialModel) -> Result<ParamBounds, AppError> {
        check_pair("T_inf", self.t_inf)?;
        if self.k.is_empty() || self.tau.is_empty() {
            return Err(AppError::invalid_input("k and tau bounds need at least one pair each."));
        }
        for &b in &self.k {
            check_pair("k", b)?;
        }
        for &b in &self.tau {
            check_pair("tau", b)?;
            if b.0 <= 0.0 {
                return Err(AppError::invalid_input(format!(
                    "Lower tau bound must be positive, got {}.",
                    b.0
                )));
            }
        }

        let n = model.param_count();
        let mut lower = vec![0.0; n];
        let mut upper = vec![0.0; n];
        lower[model.t_inf_index()] = self.t_inf.0;
        upper[model.t_inf_index()] = self.t_inf.1;
        for i in 0..model.order() {
            let (kl, ku) = broadcast(&self.k, i);
            lower[model.k_index(i)] = kl;
            upper[model.k_index(i)] = ku;
            let (tl, tu) = broadcast(&self.tau, i);
            lower[model.tau_index(i)] = tl;
            upper[model.tau_index(i)] = tu;
        }
        Ok(ParamBounds { lower, upper })
    }
}

fn broadcast(pairs: &[Bound], i: usize) -> Bound {
    pairs.get(i).copied().unwrap_or(pairs[pairs.len() - 1])
}

fn check_pair(group: &str, (lo, hi): Bound) -> Result<(), AppError> {
    if lo.is_nan() || hi.is_nan() {
        return Err(AppError::invalid_input(format!("{group} bound is NaN.")));
    }
    if lo > hi {
        return Err(AppError::invalid_input(format!(
            "{group} bound has lower > upper ({lo} > {hi})."
        )));
    }
    Ok(())
}

impl ParamBounds {
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn contains(&self, params: &[f64]) -> bool {
        params.len() == self.len()
            && params
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(&p, (&lo, &hi))| p >= lo && p <= hi)
    }

    /// Project `params` onto the box in place.
    pub fn clamp(&self, params: &mut [f64]) {
        for (j, p) in params.iter_mut().enumerate() {
            *p = p.clamp(self.lower[j], self.upper[j]);
        }
    }

    /// Whether parameter `j` sits on one of its bounds.
    pub fn is_pegged(&self, j: usize, value: f64) -> bool {
        let tol = 1e-12 * value.abs().max(1.0);
        value <= self.lower[j] + tol || value >= self.upper[j] - tol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lists_repeat_last_pair() {
        let cfg = BoundsConfig {
            t_inf: (0.0, 100.0),
            k: vec![(-50.0, 0.0)],
            tau: vec![(1.0, 10.0), (10.0, 1000.0)],
        };
        let b = cfg.expand(ExponentialModel::new(3)).unwrap();
        assert_eq!(b.lower, vec![0.0, -50.0, -50.0, -50.0, 1.0, 10.0, 10.0]);
        assert_eq!(b.upper, vec![100.0, 0.0, 0.0, 0.0, 10.0, 1000.0, 1000.0]);
    }

    #[test]
    fn defaults_match_thermal_scale() {
        let b = BoundsConfig::default().expand(ExponentialModel::new(2)).unwrap();
        assert_eq!(b.lower, vec![0.0, -120.0, -120.0, 1.0, 1.0]);
        assert_eq!(b.upper, vec![120.0, 120.0, 120.0, 3600.0, 3600.0]);
    }

    #[test]
    fn rejects_inverted_or_non_positive_tau_bounds() {
        let mut cfg = BoundsConfig::default();
        cfg.k = vec![(10.0, -10.0)];
        assert!(cfg.expand(ExponentialModel::new(1)).is_err());

        let mut cfg = BoundsConfig::default();
        cfg.tau = vec![(0.0, 10.0)];
        assert!(cfg.expand(ExponentialModel::new(1)).is_err());

        let mut cfg = BoundsConfig::default();
        cfg.tau.clear();
        assert!(cfg.expand(ExponentialModel::new(1)).is_err());
    }

    #[test]
    fn clamp_and_contains() {
        let b = BoundsConfig::default().expand(ExponentialModel::new(1)).unwrap();
        let mut p = vec![130.0, -200.0, 0.5];
        assert!(!b.contains(&p));
        b.clamp(&mut p);
        assert_eq!(p, vec![120.0, -120.0, 1.0]);
        assert!(b.contains(&p));
        assert!(b.is_pegged(2, 1.0));
        assert!(!b.is_pegged(2, 2.0));
    }
}
