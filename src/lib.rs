//! `thermofit` library crate.
//!
//! The binary (`thermofit`) is a thin wrapper around this library so that:
//!
//! - the fitting engine is testable without spawning processes
//! - ingest, fitting and reporting can be reused from other tools
//! - code stays easy to navigate as the project grows

pub mod aggregate;
pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod prep;
pub mod report;
pub mod throughput;
