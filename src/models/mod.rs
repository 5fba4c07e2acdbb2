//! Thermal decay model.
//!
//! The model is implemented as small, pure functions on a `Copy` descriptor so
//! that fitting/search code can stay generic over the model order.

pub mod model;

pub use model::*;
