//! Data preparation applied before fitting.
//!
//! - gap filling by linear interpolation against time (`interpolate`)
//! - baseline removal by subtracting a reference column (`subtract`)
//! - thermal camera calibration against an on-chip sensor (`thermocam`)

pub mod interpolate;
pub mod thermocam;

pub use interpolate::*;
pub use thermocam::*;
