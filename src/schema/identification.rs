//! Progress and result types of an identification run.

use serde::{Deserialize, Serialize};

/// Best candidate seen so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCandidate {
    /// Normalized individual.
    pub individual: Vec<f64>,
    /// Fitness (lower is better, `inf` = failed simulation).
    pub fitness: f64,
    /// Generation in which it was found.
    pub generation: usize,
}

/// Summary statistics of one generation's fitness values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct FitnessStats {
    pub avg: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl FitnessStats {
    /// Population statistics (`std` is the population standard deviation).
    ///
    /// Failed candidates (`inf`) propagate: the average becomes infinite and
    /// the standard deviation undefined, as in the logbook they came from.
    pub fn from_fitnesses(fitnesses: &[f64]) -> Self {
        if fitnesses.is_empty() {
            return Self::default();
        }
        let n = fitnesses.len() as f64;
        let avg = fitnesses.iter().sum::<f64>() / n;
        let variance = fitnesses.iter().map(|f| (f - avg).powi(2)).sum::<f64>() / n;
        Self {
            avg,
            std: variance.sqrt(),
            min: fitnesses.iter().copied().fold(f64::INFINITY, f64::min),
            max: fitnesses.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// One row of the run history. Written once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Generation number, starting at 0.
    pub generation: usize,
    /// Individuals evaluated in this generation.
    pub evaluations: usize,
    /// Individuals whose simulation failed.
    pub failures: usize,
    pub fitness: FitnessStats,
    /// Per-parameter |std / mean| across the population.
    pub dispersion: Vec<f64>,
    /// Hall-of-fame individual after this generation.
    pub best_individual: Vec<f64>,
    /// Hall-of-fame fitness after this generation.
    pub best_fitness: f64,
}

impl GenerationRecord {
    /// Largest per-parameter dispersion.
    pub fn max_dispersion(&self) -> f64 {
        self.dispersion.iter().copied().fold(0.0, f64::max)
    }

    /// Logbook line, as printed after each generation.
    pub fn log_line(&self) -> String {
        format!(
            "gen {:>5}  evals {:>3}  avg {:>12.6e}  std {:>12.6e}  min {:>12.6e}  max {:>12.6e}",
            self.generation,
            self.evaluations,
            self.fitness.avg,
            self.fitness.std,
            self.fitness.min,
            self.fitness.max
        )
    }
}

/// Current state of the identification loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum IdentificationPhase {
    /// Search distribution seeded, nothing evaluated yet.
    #[default]
    Initialized,
    /// Sampling a population.
    Generating,
    /// Running simulations.
    Evaluating,
    /// Updating the search distribution.
    Updating,
    /// Population dispersion fell below the threshold.
    Converged,
    /// Generation ceiling reached.
    MaxGenerationsReached,
    /// Stopped by the caller.
    Cancelled,
}

/// Progress update emitted after every generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentificationProgress {
    /// Generations completed.
    pub generation: usize,
    /// Generation ceiling.
    pub max_generations: usize,
    /// Simulations run so far.
    pub evaluations_completed: u64,
    /// Best fitness seen so far.
    pub best_fitness: f64,
    /// Record of the last completed generation.
    pub last_record: Option<GenerationRecord>,
    pub phase: IdentificationPhase,
}

/// Reason the run stopped. All three are successful completions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Every parameter's dispersion fell below the threshold.
    Converged,
    /// Reached maximum generations.
    MaxGenerations,
    /// User cancelled.
    Cancelled,
}

/// Statistics of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentificationStats {
    /// Total generations run.
    pub generations: usize,
    /// Total simulations run.
    pub total_evaluations: u64,
    /// Simulations scored as failures.
    pub failed_evaluations: u64,
    /// Best fitness achieved.
    pub best_fitness: f64,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Evaluations per second.
    pub evaluations_per_second: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Final result of an identification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentificationResult {
    /// Hall of fame at the end of the run.
    pub best: BestCandidate,
    /// Per-generation history, chronological.
    pub records: Vec<GenerationRecord>,
    pub stats: IdentificationStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fitness_stats() {
        let stats = FitnessStats::from_fitnesses(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stats.avg, 2.5);
        assert!((stats.std - 1.25f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
    }

    #[test]
    fn test_fitness_stats_with_failures() {
        let stats = FitnessStats::from_fitnesses(&[1.0, f64::INFINITY]);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, f64::INFINITY);
        assert_eq!(stats.avg, f64::INFINITY);
    }

    #[test]
    fn test_max_dispersion() {
        let record = GenerationRecord {
            generation: 0,
            evaluations: 3,
            failures: 0,
            fitness: FitnessStats::default(),
            dispersion: vec![0.1, 0.4, 0.2],
            best_individual: vec![0.5; 3],
            best_fitness: 1.0,
        };
        assert_eq!(record.max_dispersion(), 0.4);
        assert!(record.log_line().starts_with("gen     0"));
    }
}
