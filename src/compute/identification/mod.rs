//! Inverse identification of hygrothermal material parameters.
//!
//! Material parameters are estimated by minimizing the weighted misfit
//! between measured and simulated probe series, plus a regularization term
//! pulling the estimate toward the initial guess.
//!
//! # Overview
//!
//! - **Parameter mapping** (`mapper`): normalized individuals to physical values
//! - **Materialization** (`materializer`): candidate materials from a baseline
//! - **Objective** (`fitness`): simulate and score one candidate
//! - **Search** (`strategy`, `search`): CMA-ES and the generational driver
//! - **Tracking** (`tracker`): hall of fame, logbook and convergence
//! - **Reporting** (`report`): physical-unit results and file export
//!
//! # Example
//!
//! ```rust,ignore
//! use hygro_iden::compute::identification::IdentificationEngine;
//! use hygro_iden::compute::{MeasurementTable, SimulationCase};
//! use hygro_iden::schema::IdentificationConfig;
//!
//! let config = IdentificationConfig::default();
//! let table = MeasurementTable::load("measurements.txt")?;
//! let case = SimulationCase::new(geometry, climate, initial, schedule);
//!
//! let mut engine = IdentificationEngine::from_table(config, model, case, &table)?;
//! let result = engine.run_with_callback(|progress| {
//!     println!("Generation {}: best fitness = {:.3e}",
//!         progress.generation, progress.best_fitness);
//! })?;
//!
//! engine.report(&result).write_to_dir("results")?;
//! ```

mod error;
mod fitness;
mod mapper;
mod materializer;
mod report;
mod search;
mod strategy;
mod tracker;

pub use error::IdentificationError;
pub use fitness::{
    FitnessBreakdown, ObjectiveEvaluator, channel_residual, mean_squared_error, regularization_norm,
};
pub use mapper::{MaterialSlot, ParameterSchema, denormalize_value, normalize_value, partition};
pub use materializer::CandidateMaterializer;
pub use report::{GenerationSummary, ResultReport};
pub use search::{IdentificationEngine, ProgressCallback};
pub use strategy::{CmaEs, SearchStrategy, rank};
pub use tracker::{HallOfFame, ProgressTracker, dispersion};
