//! Hygro-Iden - Inverse identification of hygrothermal material properties.
//!
//! Unknown material parameters (conductivity, heat capacity, vapour
//! permeability, sorption isotherm) are estimated by fitting simulated
//! probe series to measured ones with CMA-ES.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration, material and result types
//! - `compute`: Measurements, the transport model seam and the
//!   identification engine
//!
//! The transport solver itself is not part of this crate. Implement
//! [`compute::TransportModel`] for it and hand it to
//! [`compute::identification::IdentificationEngine`].
//!
//! # Example
//!
//! ```rust,ignore
//! use hygro_iden::{
//!     compute::{MeasurementTable, SimulationCase, identification::IdentificationEngine},
//!     schema::IdentificationConfig,
//! };
//!
//! let config = IdentificationConfig::default();
//! let table = MeasurementTable::load("measurements.txt")?;
//! let case = SimulationCase::new(geometry, climate, initial, schedule);
//!
//! let mut engine = IdentificationEngine::from_table(config, model, case, &table)?;
//! let result = engine.run()?;
//!
//! println!("Best fitness: {:.6e}", result.best.fitness);
//! engine.report(&result).write_to_dir("results")?;
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::identification::{IdentificationEngine, IdentificationError, ResultReport};
pub use compute::{MeasurementTable, SensorObservations, SimulationCase, TransportModel};
pub use schema::{IdentificationConfig, IdentificationResult, Material};
