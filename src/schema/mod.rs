//! Schema module - Configuration, material and result types for identification runs.

mod config;
mod identification;
mod material;

pub use config::*;
pub use identification::*;
pub use material::*;
