//! Seams to the transport simulation and its post-processing.
//!
//! The identification core never solves the heat and moisture balance
//! itself. It drives a [`TransportModel`] through these traits: install
//! materials into a cloned [`Geometry`], simulate, and read probe series
//! back at the measurement timestamps.

use crate::schema::Material;

/// Spatial description of the wall: mesh plus its materials.
///
/// Evaluations clone the template and install their own materials, so a
/// geometry is never shared mutably between concurrent simulations.
pub trait Geometry: Clone + Send + Sync {
    /// Materials currently installed, in layer order.
    fn materials(&self) -> &[Material];

    /// Replace the installed materials.
    fn install_materials(&mut self, materials: Vec<Material>);
}

/// Field sampled at a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Temperature (degC).
    Temperature,
    /// Relative humidity (fraction).
    RelativeHumidity,
}

/// Why a simulation did not produce a solution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SimulationError {
    /// The solver diverged or did not converge. The candidate is scored as
    /// a failure and the run continues.
    #[error("simulation did not converge: {0}")]
    NotConverged(String),
    /// Anything else. Aborts the run.
    #[error("simulator fault: {0}")]
    Fault(String),
}

/// Transient heat and moisture transport solver plus its post-processing.
///
/// Climate, initial state and schedule are opaque to the identification
/// core and handed through unchanged.
pub trait TransportModel: Send + Sync + 'static {
    type Geometry: Geometry + 'static;
    type Climate: Send + Sync + 'static;
    type InitialState: Send + Sync + 'static;
    type Schedule: Send + Sync + 'static;
    type Solution: Send + 'static;

    /// Run one simulation.
    fn simulate(
        &self,
        geometry: &Self::Geometry,
        climate: &Self::Climate,
        initial: &Self::InitialState,
        schedule: &Self::Schedule,
    ) -> Result<Self::Solution, SimulationError>;

    /// Time series of `field` at `location`, sampled at `times`.
    fn extract_series(
        &self,
        solution: &Self::Solution,
        field: Field,
        location: f64,
        times: &[f64],
    ) -> Vec<f64>;

    /// Heat flux through `location`, sampled at `times`.
    fn extract_heat_flux(
        &self,
        solution: &Self::Solution,
        geometry: &Self::Geometry,
        climate: &Self::Climate,
        location: f64,
        times: &[f64],
    ) -> Vec<f64>;
}

/// Fixed inputs of every simulation in a run.
pub struct SimulationCase<M: TransportModel> {
    /// Geometry template; materials are replaced per candidate.
    pub geometry: M::Geometry,
    pub climate: M::Climate,
    pub initial: M::InitialState,
    pub schedule: M::Schedule,
}

impl<M: TransportModel> SimulationCase<M> {
    pub fn new(
        geometry: M::Geometry,
        climate: M::Climate,
        initial: M::InitialState,
        schedule: M::Schedule,
    ) -> Self {
        Self {
            geometry,
            climate,
            initial,
            schedule,
        }
    }
}
