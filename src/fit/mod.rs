//! Thermal model fitting.
//!
//! Responsibilities:
//!
//! - expand user bounds into a per-parameter box (`bounds`)
//! - pick an in-box starting point (`seed`)
//! - run one of the least-squares back-ends (`solver`)
//! - package the result as a `FittedModel` (`fitter`)

pub mod bounds;
pub mod fitter;
pub mod seed;
pub mod solver;

pub use bounds::*;
pub use fitter::*;
pub use seed::*;
pub use solver::*;
