//! Synthetic inputs.

pub mod synthetic;

pub use synthetic::*;
