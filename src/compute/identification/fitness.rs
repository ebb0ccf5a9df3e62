//! Objective function: simulate a candidate and score it against measurements.
//!
//! ```text
//! mse_s     = 1/N * sum_t (measured - simulated)^2
//! R_channel = 1/C * sum_s w_s * mse_s            w_s = 1 / resolution_s^2
//! reg       = alpha * 1/n * sum_i (x_i - x0_i)^2
//! fitness   = R_T + R_HR + R_Q + reg
//! ```
//!
//! A simulation that does not converge scores `inf` and never interrupts the
//! run. A simulator fault is returned as an error and aborts it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use crate::compute::{
    ChannelObservations, Field, SensorObservations, SensorSeries, SimulationCase, SimulationError,
    TransportModel,
};
use crate::schema::EvaluationConfig;

use super::{CandidateMaterializer, IdentificationError};

/// Per-term contributions to a candidate's fitness.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FitnessBreakdown {
    pub temperature: f64,
    pub humidity: f64,
    pub flux: f64,
    pub regularization: f64,
}

impl FitnessBreakdown {
    /// Scalar fitness (lower is better).
    pub fn total(&self) -> f64 {
        self.temperature + self.humidity + self.flux + self.regularization
    }
}

/// Mean squared error between two equally long series.
pub fn mean_squared_error(measured: &[f64], simulated: &[f64]) -> f64 {
    if measured.is_empty() {
        return 0.0;
    }
    measured
        .iter()
        .zip(simulated)
        .map(|(m, s)| (m - s).powi(2))
        .sum::<f64>()
        / measured.len() as f64
}

/// Mean squared deviation of `individual` from `initial_guess`.
pub fn regularization_norm(individual: &[f64], initial_guess: &[f64]) -> f64 {
    if individual.is_empty() {
        return 0.0;
    }
    individual
        .iter()
        .zip(initial_guess)
        .map(|(x, x0)| (x - x0).powi(2))
        .sum::<f64>()
        / individual.len() as f64
}

/// Weighted channel residual. `simulate` yields each sensor's simulated
/// series at the measurement timestamps. An empty channel contributes 0.
pub fn channel_residual<F>(
    channel: &ChannelObservations,
    mut simulate: F,
) -> Result<f64, IdentificationError>
where
    F: FnMut(&SensorSeries) -> Vec<f64>,
{
    if channel.is_empty() {
        return Ok(0.0);
    }

    let mut total = 0.0;
    for sensor in &channel.sensors {
        let simulated = simulate(sensor);
        if simulated.len() != sensor.measured.len() {
            return Err(IdentificationError::SimulatorFault {
                message: format!(
                    "sensor '{}': extracted {} samples, expected {}",
                    sensor.label,
                    simulated.len(),
                    sensor.measured.len()
                ),
            });
        }
        total += sensor.weight * mean_squared_error(&sensor.measured, &simulated);
    }
    Ok(total / channel.len() as f64)
}

/// Scores normalized individuals by running the transport model.
///
/// Each evaluation clones the geometry template, so one evaluator can be
/// shared by any number of concurrent evaluations.
pub struct ObjectiveEvaluator<M: TransportModel> {
    model: Arc<M>,
    case: Arc<SimulationCase<M>>,
    materializer: CandidateMaterializer,
    observations: SensorObservations,
    initial_guess: Vec<f64>,
    regularization_weight: f64,
    timeout: Option<Duration>,
    stall_limit: usize,
    /// Timed-out simulations whose threads have not returned yet.
    stalled: Arc<AtomicUsize>,
}

impl<M: TransportModel> ObjectiveEvaluator<M> {
    /// Create an evaluator. The initial guess is the centroid of the
    /// search space.
    pub fn new(
        model: Arc<M>,
        case: Arc<SimulationCase<M>>,
        materializer: CandidateMaterializer,
        observations: SensorObservations,
        regularization_weight: f64,
    ) -> Self {
        let initial_guess = materializer.schema().centroid();
        Self {
            model,
            case,
            materializer,
            observations,
            initial_guess,
            regularization_weight,
            timeout: None,
            stall_limit: EvaluationConfig::default().max_stalled_simulations,
            stalled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail any simulation that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Abort once `limit` timed-out simulations are still running.
    pub fn with_stall_limit(mut self, limit: usize) -> Self {
        self.stall_limit = limit;
        self
    }

    /// Number of timed-out simulations still running.
    pub fn stalled_simulations(&self) -> usize {
        self.stalled.load(Ordering::SeqCst)
    }

    pub fn materializer(&self) -> &CandidateMaterializer {
        &self.materializer
    }

    pub fn observations(&self) -> &SensorObservations {
        &self.observations
    }

    pub fn initial_guess(&self) -> &[f64] {
        &self.initial_guess
    }

    /// Regularization term of `individual`.
    pub fn regularization(&self, individual: &[f64]) -> f64 {
        self.regularization_weight * regularization_norm(individual, &self.initial_guess)
    }

    /// Fitness of `individual`; `inf` when the simulation failed.
    pub fn evaluate(&self, individual: &[f64]) -> Result<f64, IdentificationError> {
        let fitness = match self.evaluate_detailed(individual)? {
            Some(breakdown) => breakdown.total(),
            None => f64::INFINITY,
        };
        if fitness.is_nan() {
            log::warn!("Candidate {:?} produced a NaN residual, scored as failed", individual);
            return Ok(f64::INFINITY);
        }
        Ok(fitness)
    }

    /// Per-term fitness of `individual`, or `None` when the simulation failed.
    pub fn evaluate_detailed(
        &self,
        individual: &[f64],
    ) -> Result<Option<FitnessBreakdown>, IdentificationError> {
        let geometry = self.materializer.install(&self.case.geometry, individual)?;

        let (geometry, solution) = match self.simulate(geometry)? {
            Some(outcome) => outcome,
            None => return Ok(None),
        };

        let times = &self.observations.times;
        let model = &self.model;

        let temperature = channel_residual(&self.observations.temperature, |sensor| {
            model.extract_series(&solution, Field::Temperature, sensor.location, times)
        })?;
        let humidity = channel_residual(&self.observations.humidity, |sensor| {
            model.extract_series(&solution, Field::RelativeHumidity, sensor.location, times)
        })?;
        let flux = channel_residual(&self.observations.flux, |sensor| {
            model.extract_heat_flux(
                &solution,
                &geometry,
                &self.case.climate,
                sensor.location,
                times,
            )
        })?;

        Ok(Some(FitnessBreakdown {
            temperature,
            humidity,
            flux,
            regularization: self.regularization(individual),
        }))
    }

    /// Run the model on a prepared geometry. `None` means a scoreable
    /// failure (no convergence or timeout).
    fn simulate(
        &self,
        geometry: M::Geometry,
    ) -> Result<Option<(M::Geometry, M::Solution)>, IdentificationError> {
        let (geometry, result) = match self.timeout {
            None => {
                let case = &self.case;
                let result =
                    self.model
                        .simulate(&geometry, &case.climate, &case.initial, &case.schedule);
                (geometry, result)
            }
            Some(timeout) => match self.simulate_with_timeout(geometry, timeout)? {
                Some(outcome) => outcome,
                None => return Ok(None),
            },
        };

        match result {
            Ok(solution) => Ok(Some((geometry, solution))),
            Err(SimulationError::NotConverged(reason)) => {
                log::warn!("Simulation failed, candidate scored as inf: {}", reason);
                Ok(None)
            }
            Err(fault @ SimulationError::Fault(_)) => Err(fault.into()),
        }
    }

    /// Run the simulation on its own thread and give up after `timeout`.
    ///
    /// A timed-out thread is detached and counted as stalled until it
    /// returns; its result is dropped. No new thread is started while
    /// `stall_limit` threads are stalled.
    #[allow(clippy::type_complexity)]
    fn simulate_with_timeout(
        &self,
        geometry: M::Geometry,
        timeout: Duration,
    ) -> Result<
        Option<(M::Geometry, Result<M::Solution, SimulationError>)>,
        IdentificationError,
    > {
        let stalled = self.stalled_simulations();
        if stalled >= self.stall_limit {
            return Err(IdentificationError::SimulatorFault {
                message: format!("{} timed-out simulations are still running", stalled),
            });
        }

        let (tx, rx) = mpsc::channel();
        let model = Arc::clone(&self.model);
        let case = Arc::clone(&self.case);
        // Set by whichever side finishes first: the worker or the timeout.
        let finished = Arc::new(AtomicBool::new(false));
        let worker_finished = Arc::clone(&finished);
        let worker_stalled = Arc::clone(&self.stalled);

        thread::Builder::new()
            .name("simulation".to_string())
            .spawn(move || {
                let result = model.simulate(&geometry, &case.climate, &case.initial, &case.schedule);
                let _ = tx.send((geometry, result));
                if worker_finished.swap(true, Ordering::SeqCst) {
                    worker_stalled.fetch_sub(1, Ordering::SeqCst);
                }
            })?;

        match rx.recv_timeout(timeout) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                self.stalled.fetch_add(1, Ordering::SeqCst);
                if finished.swap(true, Ordering::SeqCst) {
                    self.stalled.fetch_sub(1, Ordering::SeqCst);
                }
                log::warn!(
                    "Simulation exceeded {:.1}s, candidate scored as inf ({} stalled)",
                    timeout.as_secs_f64(),
                    self.stalled_simulations()
                );
                Ok(None)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(IdentificationError::SimulatorFault {
                message: "simulation thread panicked".to_string(),
            }),
        }
    }
}
