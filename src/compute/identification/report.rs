//! Physical-unit report of a finished run and its on-disk export.
//!
//! `write_to_dir` produces:
//!
//! ```text
//! bestfit.txt       best physical value per line
//! bestfit_tag.txt   material.parameter tag per line
//! stats.txt         per generation: std, min, best physical values, dispersion
//! report.json       everything above plus run statistics
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compute::TransportModel;
use crate::schema::{FitnessStats, IdentificationResult, IdentificationStats};

use super::fitness::regularization_norm;
use super::search::IdentificationEngine;
use super::strategy::SearchStrategy;
use super::{IdentificationError, ParameterSchema};

/// One logbook line, translated to physical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub generation: usize,
    pub evaluations: usize,
    pub failures: usize,
    pub fitness: FitnessStats,
    pub dispersion: Vec<f64>,
    /// Hall-of-fame individual after this generation, physical units.
    pub best_physical: Vec<f64>,
}

/// Identified parameters and run history in physical units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultReport {
    pub tags: Vec<String>,
    pub best_normalized: Vec<f64>,
    pub best_physical: Vec<f64>,
    pub best_fitness: f64,
    pub best_generation: usize,
    /// Mean squared distance of the best individual from the initial
    /// guess, the abscissa of an L-curve.
    pub regularization_norm: f64,
    /// Best fitness without its regularization term.
    pub residual: f64,
    pub regularization_weight: f64,
    pub generations: Vec<GenerationSummary>,
    pub stats: IdentificationStats,
}

impl ResultReport {
    /// Build a report. `material_names` label the tags; `initial_guess`
    /// is the normalized starting point.
    pub fn new(
        result: &IdentificationResult,
        schema: &ParameterSchema,
        material_names: &[String],
        initial_guess: &[f64],
        regularization_weight: f64,
    ) -> Self {
        let best = &result.best;
        let norm = regularization_norm(&best.individual, initial_guess);

        let generations = result
            .records
            .iter()
            .map(|record| GenerationSummary {
                generation: record.generation,
                evaluations: record.evaluations,
                failures: record.failures,
                fitness: record.fitness,
                dispersion: record.dispersion.clone(),
                best_physical: schema.to_physical(&record.best_individual),
            })
            .collect();

        Self {
            tags: schema.tags(material_names),
            best_normalized: best.individual.clone(),
            best_physical: schema.to_physical(&best.individual),
            best_fitness: best.fitness,
            best_generation: best.generation,
            regularization_norm: norm,
            residual: best.fitness - regularization_weight * norm,
            regularization_weight,
            generations,
            stats: result.stats.clone(),
        }
    }

    /// Write the report files into `dir`, creating it if needed.
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>, IdentificationError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut bestfit = String::new();
        for value in &self.best_physical {
            let _ = writeln!(bestfit, "{:.18e}", value);
        }

        let mut tags = String::new();
        for tag in &self.tags {
            let _ = writeln!(tags, "{}", tag);
        }

        let mut stats = String::new();
        for summary in &self.generations {
            let _ = write!(
                stats,
                "{:.18e}\t{:.18e}",
                summary.fitness.std, summary.fitness.min
            );
            for value in summary.best_physical.iter().chain(&summary.dispersion) {
                let _ = write!(stats, "\t{:.18e}", value);
            }
            stats.push('\n');
        }

        let json = serde_json::to_string_pretty(self)?;

        let files = [
            ("bestfit.txt", bestfit),
            ("bestfit_tag.txt", tags),
            ("stats.txt", stats),
            ("report.json", json),
        ];
        let mut paths = Vec::with_capacity(files.len());
        for (name, content) in files {
            let path = dir.join(name);
            fs::write(&path, content)?;
            paths.push(path);
        }
        Ok(paths)
    }
}

impl<M: TransportModel, S: SearchStrategy> IdentificationEngine<M, S> {
    /// Report `result` in physical units.
    pub fn report(&self, result: &IdentificationResult) -> ResultReport {
        let evaluator = self.evaluator();
        let names: Vec<String> = evaluator
            .materializer()
            .baseline_materials()
            .iter()
            .map(|m| m.name.clone())
            .collect();

        ResultReport::new(
            result,
            self.schema(),
            &names,
            evaluator.initial_guess(),
            self.config().regularization.weight,
        )
    }
}
