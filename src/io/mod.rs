//! Input/output helpers.
//!
//! - thermobench CSV ingest + unit normalization (`ingest`)
//! - series and result exports (CSV/JSON) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
