//! Human-readable rendering of fit results.

pub mod format;

pub use format::*;
