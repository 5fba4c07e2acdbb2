//! Mathematical utilities: least squares and sampling statistics.

pub mod ols;
pub mod stats;

pub use ols::*;
pub use stats::*;
