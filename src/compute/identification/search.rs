//! Generational driver of an identification run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::compute::{MeasurementTable, SensorObservations, SimulationCase, TransportModel};
use crate::schema::{
    BestCandidate, ConfigError, IdentificationConfig, IdentificationPhase, IdentificationProgress,
    IdentificationResult, IdentificationStats, StopReason,
};

use super::fitness::ObjectiveEvaluator;
use super::materializer::CandidateMaterializer;
use super::strategy::{CmaEs, SearchStrategy};
use super::tracker::{ProgressTracker, dispersion};
use super::{IdentificationError, ParameterSchema};

/// Progress callback type.
pub type ProgressCallback = Box<dyn Fn(&IdentificationProgress) + Send + Sync>;

/// Runs the generate / evaluate / update loop until convergence, the
/// generation limit or cancellation.
pub struct IdentificationEngine<M: TransportModel, S: SearchStrategy = CmaEs> {
    config: IdentificationConfig,
    schema: Arc<ParameterSchema>,
    evaluator: ObjectiveEvaluator<M>,
    strategy: S,
    tracker: ProgressTracker,
    pool: Option<rayon::ThreadPool>,
    generation: usize,
    phase: IdentificationPhase,
    cancelled: Arc<AtomicBool>,
}

impl<M: TransportModel> IdentificationEngine<M, CmaEs> {
    /// Create an engine. The configuration is validated here, before any
    /// simulation runs.
    pub fn new(
        config: IdentificationConfig,
        model: M,
        case: SimulationCase<M>,
        observations: SensorObservations,
    ) -> Result<Self, IdentificationError> {
        config.validate()?;
        if observations.temperature.is_empty()
            && observations.humidity.is_empty()
            && observations.flux.is_empty()
        {
            return Err(ConfigError::NoSensors.into());
        }

        let schema = Arc::new(ParameterSchema::new(&config.materials)?);
        let materializer = CandidateMaterializer::new(Arc::clone(&schema), &case.geometry)?;
        let evaluator = ObjectiveEvaluator::new(
            Arc::new(model),
            Arc::new(case),
            materializer,
            observations,
            config.regularization.weight,
        )
        .with_timeout(config.evaluation.timeout_secs.map(Duration::from_secs_f64))
        .with_stall_limit(config.evaluation.max_stalled_simulations);

        let seed = config.random_seed.unwrap_or_else(rand::random);
        let strategy = CmaEs::new(&schema.centroid(), &config.strategy, seed);

        let pool = match config.evaluation.parallel_workers {
            0 => None,
            workers => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()?,
            ),
        };

        Ok(Self {
            config,
            schema,
            evaluator,
            strategy,
            tracker: ProgressTracker::new(),
            pool,
            generation: 0,
            phase: IdentificationPhase::Initialized,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Create an engine, binding the configured sensors to a measurement
    /// table.
    pub fn from_table(
        config: IdentificationConfig,
        model: M,
        case: SimulationCase<M>,
        table: &MeasurementTable,
    ) -> Result<Self, IdentificationError> {
        let observations = SensorObservations::bind(&config.sensors, table)?;
        Self::new(config, model, case, observations)
    }
}

impl<M: TransportModel, S: SearchStrategy> IdentificationEngine<M, S> {
    /// Replace the search strategy. Only meaningful before the run starts.
    pub fn with_strategy<T: SearchStrategy>(self, strategy: T) -> IdentificationEngine<M, T> {
        IdentificationEngine {
            config: self.config,
            schema: self.schema,
            evaluator: self.evaluator,
            strategy,
            tracker: self.tracker,
            pool: self.pool,
            generation: self.generation,
            phase: self.phase,
            cancelled: self.cancelled,
        }
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn config(&self) -> &IdentificationConfig {
        &self.config
    }

    pub fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    pub fn evaluator(&self) -> &ObjectiveEvaluator<M> {
        &self.evaluator
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Score a population, preserving order. The first fatal error aborts
    /// the whole batch.
    fn evaluate_population(&self, population: &[Vec<f64>]) -> Result<Vec<f64>, IdentificationError> {
        let evaluator = &self.evaluator;
        let evaluate = || {
            population
                .par_iter()
                .map(|individual| evaluator.evaluate(individual))
                .collect::<Result<Vec<f64>, IdentificationError>>()
        };

        match &self.pool {
            Some(pool) => pool.install(evaluate),
            None => evaluate(),
        }
    }

    /// Run one generation. Returns the stop reason if the run is over.
    fn step_generation(&mut self) -> Result<Option<StopReason>, IdentificationError> {
        self.phase = IdentificationPhase::Generating;
        let population = self.strategy.generate();
        let spread = dispersion(&population);

        self.phase = IdentificationPhase::Evaluating;
        let fitnesses = self.evaluate_population(&population)?;

        self.phase = IdentificationPhase::Updating;
        let record = self
            .tracker
            .record(self.generation, &population, &fitnesses, spread);
        log::info!("{}", record.log_line());
        self.strategy.update(&population, &fitnesses);
        self.generation += 1;

        if self
            .tracker
            .is_converged(self.config.termination.dispersion_threshold)
        {
            return Ok(Some(StopReason::Converged));
        }
        if self.generation >= self.config.termination.max_generations {
            return Ok(Some(StopReason::MaxGenerations));
        }
        Ok(None)
    }

    /// Get current progress.
    pub fn progress(&self) -> IdentificationProgress {
        IdentificationProgress {
            generation: self.generation,
            max_generations: self.config.termination.max_generations,
            evaluations_completed: self.tracker.total_evaluations(),
            best_fitness: self.tracker.best_fitness(),
            last_record: self.tracker.last_record().cloned(),
            phase: self.phase,
        }
    }

    /// Run identification with progress callback.
    ///
    /// The callback sees the engine state after every completed
    /// generation.
    pub fn run_with_callback<F>(
        &mut self,
        callback: F,
    ) -> Result<IdentificationResult, IdentificationError>
    where
        F: Fn(&IdentificationProgress),
    {
        let start_time = Instant::now();
        log::info!(
            "Identifying {} parameters in {} material(s), population {}, at most {} generations",
            self.schema.dimension(),
            self.schema.slots().len(),
            self.config.strategy.population_size,
            self.config.termination.max_generations
        );
        callback(&self.progress());

        let stop_reason = loop {
            if self.cancelled.load(Ordering::Relaxed) {
                break StopReason::Cancelled;
            }
            let stop = self.step_generation()?;
            callback(&self.progress());
            if let Some(reason) = stop {
                break reason;
            }
        };

        self.phase = match stop_reason {
            StopReason::Converged => IdentificationPhase::Converged,
            StopReason::MaxGenerations => IdentificationPhase::MaxGenerationsReached,
            StopReason::Cancelled => IdentificationPhase::Cancelled,
        };
        callback(&self.progress());

        let elapsed = start_time.elapsed().as_secs_f64();
        let total_evaluations = self.tracker.total_evaluations();
        let best = self.tracker.best().cloned().unwrap_or_else(|| BestCandidate {
            individual: self.schema.centroid(),
            fitness: f64::INFINITY,
            generation: 0,
        });

        log::info!(
            "Identification stopped after {} generations ({:?}), best fitness {:.6e}",
            self.generation,
            stop_reason,
            best.fitness
        );

        Ok(IdentificationResult {
            best,
            records: self.tracker.records().to_vec(),
            stats: IdentificationStats {
                generations: self.generation,
                total_evaluations,
                failed_evaluations: self.tracker.failed_evaluations(),
                best_fitness: self.tracker.best_fitness(),
                elapsed_seconds: elapsed,
                evaluations_per_second: if elapsed > 0.0 {
                    total_evaluations as f64 / elapsed
                } else {
                    0.0
                },
                stop_reason,
            },
        })
    }

    /// Run identification (blocking).
    pub fn run(&mut self) -> Result<IdentificationResult, IdentificationError> {
        self.run_with_callback(|_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::identification::fitness::tests::{
        StubBehavior, StubModel, observations, wall,
    };
    use crate::schema::{
        CmaEsConfig, EvaluationConfig, MaterialParameter, MaterialSearchSpace, ParameterBound,
        TerminationConfig,
    };
    use std::sync::Mutex;

    /// Strategy that samples the same point over and over.
    struct Frozen {
        point: Vec<f64>,
        size: usize,
        generation: usize,
    }

    impl SearchStrategy for Frozen {
        fn generate(&mut self) -> Vec<Vec<f64>> {
            vec![self.point.clone(); self.size]
        }

        fn update(&mut self, _population: &[Vec<f64>], _fitnesses: &[f64]) {
            self.generation += 1;
        }

        fn generation(&self) -> usize {
            self.generation
        }
    }

    fn config(max_generations: usize) -> IdentificationConfig {
        IdentificationConfig {
            strategy: CmaEsConfig {
                population_size: 8,
                ..Default::default()
            },
            materials: vec![MaterialSearchSpace {
                material: 0,
                parameters: vec![
                    ParameterBound::new(MaterialParameter::Lambda0, 0.0, 1.0),
                    ParameterBound::new(MaterialParameter::Cp0, 500.0, 2000.0),
                ],
            }],
            termination: TerminationConfig {
                max_generations,
                ..Default::default()
            },
            random_seed: Some(11),
            ..Default::default()
        }
    }

    fn engine(behavior: StubBehavior, config: IdentificationConfig) -> IdentificationEngine<StubModel> {
        let model = StubModel {
            behavior,
            observations: observations(),
        };
        IdentificationEngine::new(config, model, SimulationCase::new(wall(), (), (), ()), observations())
            .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected_before_running() {
        let mut bad = config(5);
        bad.materials[0].parameters[0].high = 0.0;
        let model = StubModel {
            behavior: StubBehavior::Exact,
            observations: observations(),
        };
        let result =
            IdentificationEngine::new(bad, model, SimulationCase::new(wall(), (), (), ()), observations());
        assert!(matches!(result, Err(IdentificationError::Config(_))));
    }

    #[test]
    fn test_always_failing_simulator() {
        let mut engine = engine(StubBehavior::NotConverged, config(1));
        let result = engine.run().unwrap();

        assert_eq!(result.stats.generations, 1);
        assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
        assert_eq!(result.best.fitness, f64::INFINITY);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].failures, 8);
        assert_eq!(result.stats.failed_evaluations, 8);
    }

    #[test]
    fn test_identical_population_converges_immediately() {
        let mut engine = engine(StubBehavior::Exact, config(50)).with_strategy(Frozen {
            point: vec![0.5, 0.5],
            size: 6,
            generation: 0,
        });
        let result = engine.run().unwrap();

        assert_eq!(result.stats.stop_reason, StopReason::Converged);
        assert_eq!(result.stats.generations, 1);
        assert_eq!(result.records[0].max_dispersion(), 0.0);
        assert_eq!(result.best.individual, vec![0.5, 0.5]);
        assert_eq!(result.best.fitness, 0.0);
    }

    #[test]
    fn test_runs_to_max_generations() {
        let mut engine = engine(StubBehavior::OffsetByConductivity, config(4));
        let result = engine.run().unwrap();

        assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
        assert_eq!(result.stats.generations, 4);
        assert_eq!(result.stats.total_evaluations, 32);
        assert_eq!(result.records.len(), 4);
        assert!(result.best.fitness.is_finite());
        for pair in result.records.windows(2) {
            assert!(pair[1].best_fitness <= pair[0].best_fitness);
        }
        assert_eq!(result.best.fitness, result.records[3].best_fitness);
    }

    #[test]
    fn test_cancellation() {
        let mut engine = engine(StubBehavior::Exact, config(100));
        let cancel = engine.cancel_handle();

        // Cancel immediately
        cancel.store(true, Ordering::Relaxed);

        let result = engine.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 0);
        assert_eq!(result.best.fitness, f64::INFINITY);
        assert_eq!(engine.progress().phase, IdentificationPhase::Cancelled);
    }

    #[test]
    fn test_simulator_fault_aborts() {
        let mut engine = engine(StubBehavior::Fault, config(10));
        assert!(matches!(
            engine.run(),
            Err(IdentificationError::SimulatorFault { .. })
        ));
    }

    #[test]
    fn test_worker_pool_matches_default_pool() {
        let serial = engine(StubBehavior::OffsetByConductivity, config(3)).run().unwrap();

        let mut pooled_config = config(3);
        pooled_config.evaluation = EvaluationConfig {
            parallel_workers: 2,
            ..Default::default()
        };
        let pooled = engine(StubBehavior::OffsetByConductivity, pooled_config)
            .run()
            .unwrap();

        assert_eq!(serial.best, pooled.best);
        assert_eq!(serial.records, pooled.records);
    }

    #[test]
    fn test_progress_callback() {
        let phases = Mutex::new(Vec::new());
        let mut engine = engine(StubBehavior::Exact, config(2));
        engine
            .run_with_callback(|p| phases.lock().unwrap().push((p.generation, p.phase)))
            .unwrap();

        let phases = phases.into_inner().unwrap();
        assert_eq!(phases.first(), Some(&(0, IdentificationPhase::Initialized)));
        assert_eq!(
            phases.last(),
            Some(&(2, IdentificationPhase::MaxGenerationsReached))
        );
        assert_eq!(phases.len(), 4);
    }
}
