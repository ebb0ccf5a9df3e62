//! Errors that stop an identification run.

use crate::compute::{MeasurementError, SimulationError};
use crate::schema::ConfigError;

/// Fatal identification errors.
///
/// Ordinary simulation failures never show up here; they are scored as
/// `inf` and the run goes on.
#[derive(Debug, thiserror::Error)]
pub enum IdentificationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Measurement error: {0}")]
    Measurement(#[from] MeasurementError),
    #[error("Unhandled simulator fault: {message}")]
    SimulatorFault { message: String },
    #[error("Parameter slot {slot} out of range ({count} slots)")]
    SlotOutOfRange { slot: usize, count: usize },
    #[error("Individual has {found} values, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Failed to build evaluation thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SimulationError> for IdentificationError {
    fn from(err: SimulationError) -> Self {
        Self::SimulatorFault {
            message: err.to_string(),
        }
    }
}
