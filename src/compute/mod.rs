//! Compute module - Measurements, the simulation seam and identification.

mod measurement;
mod model;

pub mod identification;

pub use measurement::*;
pub use model::*;
