//! Hall of fame, per-generation logbook and the convergence test.

use crate::schema::{BestCandidate, FitnessStats, GenerationRecord};

use super::strategy::rank;

/// Relative spread `|std / mean|` of every coordinate across `population`.
///
/// A coordinate with zero spread has dispersion 0, even at mean 0. A
/// coordinate with spread around a zero mean has infinite dispersion.
pub fn dispersion(population: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = population.first() else {
        return Vec::new();
    };
    let n = population.len() as f64;

    (0..first.len())
        .map(|j| {
            if population.iter().all(|x| x[j] == first[j]) {
                return 0.0;
            }
            let mean = population.iter().map(|x| x[j]).sum::<f64>() / n;
            let std = (population.iter().map(|x| (x[j] - mean).powi(2)).sum::<f64>() / n).sqrt();
            if std == 0.0 {
                0.0
            } else if mean == 0.0 {
                f64::INFINITY
            } else {
                (std / mean).abs()
            }
        })
        .collect()
}

/// Best individual seen so far.
#[derive(Debug, Clone, Default)]
pub struct HallOfFame {
    best: Option<BestCandidate>,
}

impl HallOfFame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn best(&self) -> Option<&BestCandidate> {
        self.best.as_ref()
    }

    /// Offer a scored population. The first population always fills the
    /// hall; later ones replace it only on strict improvement.
    ///
    /// Returns `true` when the best individual changed.
    pub fn update(&mut self, population: &[Vec<f64>], fitnesses: &[f64], generation: usize) -> bool {
        let Some(&top) = rank(fitnesses).first() else {
            return false;
        };
        let fitness = fitnesses[top];

        let improved = match &self.best {
            None => true,
            Some(best) => fitness < best.fitness,
        };
        if improved {
            self.best = Some(BestCandidate {
                individual: population[top].clone(),
                fitness,
                generation,
            });
        }
        improved
    }
}

/// Records the progress of one run.
///
/// The logbook is append-only: one record per completed generation.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    hall_of_fame: HallOfFame,
    records: Vec<GenerationRecord>,
    total_evaluations: u64,
    failed_evaluations: u64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a scored generation. `dispersion` is the spread of the
    /// population as sampled, before evaluation.
    pub fn record(
        &mut self,
        generation: usize,
        population: &[Vec<f64>],
        fitnesses: &[f64],
        dispersion: Vec<f64>,
    ) -> &GenerationRecord {
        if self.hall_of_fame.update(population, fitnesses, generation)
            && let Some(best) = self.hall_of_fame.best()
        {
            log::debug!(
                "Generation {}: new best fitness {:.6e}",
                generation,
                best.fitness
            );
        }

        let failures = fitnesses.iter().filter(|f| !f.is_finite()).count();
        self.total_evaluations += fitnesses.len() as u64;
        self.failed_evaluations += failures as u64;

        let (best_individual, best_fitness) = match self.hall_of_fame.best() {
            Some(best) => (best.individual.clone(), best.fitness),
            None => (Vec::new(), f64::INFINITY),
        };

        self.records.push(GenerationRecord {
            generation,
            evaluations: fitnesses.len(),
            failures,
            fitness: FitnessStats::from_fitnesses(fitnesses),
            dispersion,
            best_individual,
            best_fitness,
        });
        &self.records[self.records.len() - 1]
    }

    /// `true` once the latest generation's largest dispersion is below
    /// `threshold`.
    pub fn is_converged(&self, threshold: f64) -> bool {
        self.records
            .last()
            .is_some_and(|record| record.max_dispersion() < threshold)
    }

    pub fn best(&self) -> Option<&BestCandidate> {
        self.hall_of_fame.best()
    }

    pub fn best_fitness(&self) -> f64 {
        self.best().map_or(f64::INFINITY, |b| b.fitness)
    }

    pub fn records(&self) -> &[GenerationRecord] {
        &self.records
    }

    pub fn last_record(&self) -> Option<&GenerationRecord> {
        self.records.last()
    }

    pub fn total_evaluations(&self) -> u64 {
        self.total_evaluations
    }

    pub fn failed_evaluations(&self) -> u64 {
        self.failed_evaluations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_dispersion_of_identical_population() {
        let population = vec![vec![0.4, 0.0, 1.2]; 6];
        assert_eq!(dispersion(&population), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_dispersion_values() {
        let population = vec![vec![1.0, -1.0], vec![3.0, 1.0]];
        let d = dispersion(&population);
        assert_eq!(d[0], 0.5);
        assert_eq!(d[1], f64::INFINITY);

        let negative = vec![vec![-1.0], vec![-3.0]];
        assert_eq!(dispersion(&negative), vec![0.5]);
    }

    #[test]
    fn test_first_generation_seeds_hall_of_fame() {
        let mut hof = HallOfFame::new();
        let population = vec![vec![0.1], vec![0.2]];
        assert!(hof.update(&population, &[f64::INFINITY, f64::INFINITY], 0));

        let best = hof.best().unwrap();
        assert_eq!(best.fitness, f64::INFINITY);
        assert_eq!(best.individual, vec![0.1]);
        assert_eq!(best.generation, 0);
    }

    #[test]
    fn test_hall_of_fame_requires_strict_improvement() {
        let mut hof = HallOfFame::new();
        hof.update(&[vec![0.1], vec![0.2]], &[2.0, 1.0], 0);
        assert_eq!(hof.best().unwrap().individual, vec![0.2]);

        assert!(!hof.update(&[vec![0.7]], &[1.0], 1));
        assert_eq!(hof.best().unwrap().generation, 0);

        assert!(hof.update(&[vec![0.9], vec![0.8]], &[0.5, 0.5], 2));
        assert_eq!(hof.best().unwrap().individual, vec![0.9]);
    }

    #[test]
    fn test_identical_population_converges() {
        let mut tracker = ProgressTracker::new();
        assert!(!tracker.is_converged(1e-3));

        let population = vec![vec![0.5, 0.5]; 4];
        let d = dispersion(&population);
        tracker.record(0, &population, &[1.0; 4], d);
        assert!(tracker.is_converged(1e-3));
    }

    #[test]
    fn test_failures_are_counted() {
        let mut tracker = ProgressTracker::new();
        let population = vec![vec![0.1], vec![0.9], vec![0.5]];
        let record = tracker.record(0, &population, &[f64::INFINITY, 3.0, 2.0], vec![0.6]);
        assert_eq!(record.failures, 1);
        assert_eq!(record.best_fitness, 2.0);
        assert_eq!(record.best_individual, vec![0.5]);
        assert_eq!(tracker.total_evaluations(), 3);
        assert_eq!(tracker.failed_evaluations(), 1);
    }

    proptest! {
        #[test]
        fn hall_of_fame_never_worsens(
            generations in proptest::collection::vec(
                proptest::collection::vec(prop_oneof![Just(f64::INFINITY), 0.0f64..100.0], 1..8),
                1..20,
            )
        ) {
            let mut tracker = ProgressTracker::new();
            let mut previous = f64::INFINITY;
            for (g, fitnesses) in generations.iter().enumerate() {
                let population: Vec<Vec<f64>> = (0..fitnesses.len()).map(|i| vec![i as f64]).collect();
                let record = tracker.record(g, &population, fitnesses, vec![1.0]);
                prop_assert!(record.best_fitness <= previous);
                previous = record.best_fitness;
            }
            prop_assert_eq!(tracker.records().len(), generations.len());
        }
    }
}
