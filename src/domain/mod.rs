//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the measured data holder (`TimeSeries`, `Column`)
//! - fit outputs (`FittedModel`, `ThroughputEstimate`, `MultiFitResult`)
//! - the point-or-measurement cell type (`Value`)
//! - the column role schema used to find counter columns by name

pub mod schema;
pub mod types;

pub use schema::*;
pub use types::*;
