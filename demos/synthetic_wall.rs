//! Identify three wood fibre parameters from synthetic wall measurements.
//!
//! The transport model here is a lumped relaxation toward the exterior
//! climate, enough to exercise the full pipeline: measurement parsing,
//! sensor binding, parallel CMA-ES and the report export.

use std::fmt::Write as _;
use std::time::Instant;

use hygro_iden::{
    compute::{
        Field, Geometry, MeasurementTable, SimulationCase, SimulationError, TransportModel,
        identification::IdentificationEngine,
    },
    schema::{
        IdentificationConfig, Material, MaterialParameter, MaterialSearchSpace, ParameterBound,
        PropertySet, RegularizationConfig, TerminationConfig,
    },
};

/// lambda_0, cp_0 and dp_p1 of the material that produced the measurements.
const TRUTH: [f64; 3] = [0.045, 1700.0, 4.0e-11];

/// Vapour pressure scale turning permeability into a moisture rate.
const VAPOUR_SCALE: f64 = 5.0e4;

#[derive(Debug, Clone)]
struct Slab {
    materials: Vec<Material>,
}

impl Geometry for Slab {
    fn materials(&self) -> &[Material] {
        &self.materials
    }

    fn install_materials(&mut self, materials: Vec<Material>) {
        self.materials = materials;
    }
}

#[derive(Debug, Clone, Copy)]
struct State {
    temperature: f64,
    humidity: f64,
}

struct Relaxation;

struct Solution {
    thermal_rate: f64,
    moisture_rate: f64,
    conductivity: f64,
    initial: State,
    exterior: State,
}

impl Solution {
    fn relax(&self, from: f64, to: f64, rate: f64, location: f64, t: f64) -> f64 {
        to + (from - to) * (-rate * t / location.powi(2)).exp()
    }
}

impl TransportModel for Relaxation {
    type Geometry = Slab;
    type Climate = State;
    type InitialState = State;
    type Schedule = ();
    type Solution = Solution;

    fn simulate(
        &self,
        geometry: &Slab,
        climate: &State,
        initial: &State,
        _schedule: &(),
    ) -> Result<Solution, SimulationError> {
        let m = geometry
            .materials
            .first()
            .ok_or_else(|| SimulationError::Fault("no material installed".to_string()))?;

        let conductivity = m.conductivity.at(0.0, initial.temperature);
        let capacity = m.density * m.capacity.at(initial.temperature);
        let slope = m.isotherm.at(initial.humidity);
        if conductivity <= 0.0 || capacity <= 0.0 || slope <= 0.0 {
            return Err(SimulationError::NotConverged(
                "non-physical material properties".to_string(),
            ));
        }

        Ok(Solution {
            thermal_rate: conductivity / capacity,
            moisture_rate: m.vapor_permeability.at(initial.humidity) * VAPOUR_SCALE / slope,
            conductivity,
            initial: *initial,
            exterior: *climate,
        })
    }

    fn extract_series(&self, s: &Solution, field: Field, location: f64, times: &[f64]) -> Vec<f64> {
        let (from, to, rate) = match field {
            Field::Temperature => (s.initial.temperature, s.exterior.temperature, s.thermal_rate),
            Field::RelativeHumidity => (s.initial.humidity, s.exterior.humidity, s.moisture_rate),
        };
        times
            .iter()
            .map(|&t| s.relax(from, to, rate, location, t))
            .collect()
    }

    fn extract_heat_flux(
        &self,
        s: &Solution,
        _geometry: &Slab,
        climate: &State,
        location: f64,
        times: &[f64],
    ) -> Vec<f64> {
        self.extract_series(s, Field::Temperature, location, times)
            .into_iter()
            .map(|t| s.conductivity * (t - climate.temperature) / location)
            .collect()
    }
}

fn wood_fibre(lambda_0: f64, cp_0: f64, dp_p1: f64) -> Material {
    let props = PropertySet {
        lambda_0,
        lambda_m: 0.0,
        lambda_t: 1e-4,
        cp_0,
        cp_t: 0.0,
        dp_p1,
        dp_p2: 8e-11,
        xi_p1: 20.0,
        xi_p2: 25.0,
        xi_p3: 60.0,
    };
    Material::new("wood fibre", 150.0, &props)
}

/// Tab-delimited measurements produced by the true material.
fn synthetic_measurements(case: &SimulationCase<Relaxation>) -> Result<String, SimulationError> {
    let model = Relaxation;
    let times: Vec<f64> = (0..=168).map(|h| h as f64 * 3600.0).collect();
    let solution = model.simulate(&case.geometry, &case.climate, &case.initial, &case.schedule)?;

    let temperature = model.extract_series(&solution, Field::Temperature, 0.12, &times);
    let humidity = model.extract_series(&solution, Field::RelativeHumidity, 0.12, &times);
    let flux = model.extract_heat_flux(&solution, &case.geometry, &case.climate, 0.08, &times);

    let mut out = String::from("temps (s)\tT_12\tHR_12\tFLX_8\n");
    for (((t, temp), hr), q) in times.iter().zip(&temperature).zip(&humidity).zip(&flux) {
        let _ = writeln!(out, "{}\t{:.4}\t{:.5}\t{:.4}", t, temp, hr, q);
    }
    Ok(out)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("=== Synthetic Wall Identification ===\n");

    let climate = State {
        temperature: 5.0,
        humidity: 0.8,
    };
    let initial = State {
        temperature: 20.0,
        humidity: 0.5,
    };

    let truth = SimulationCase::<Relaxation>::new(
        Slab {
            materials: vec![wood_fibre(TRUTH[0], TRUTH[1], TRUTH[2])],
        },
        climate,
        initial,
        (),
    );
    let table = MeasurementTable::parse(&synthetic_measurements(&truth)?)?;
    println!("Measurements: {} rows, columns {:?}", table.rows(), table.headers());

    let config = IdentificationConfig {
        materials: vec![MaterialSearchSpace {
            material: 0,
            parameters: vec![
                ParameterBound::new(MaterialParameter::Lambda0, 0.02, 0.08),
                ParameterBound::new(MaterialParameter::Cp0, 1000.0, 2500.0),
                ParameterBound::new(MaterialParameter::DpP1, 2e-11, 7.5e-11),
            ],
        }],
        termination: TerminationConfig {
            max_generations: 150,
            ..Default::default()
        },
        regularization: RegularizationConfig { weight: 1.0 },
        random_seed: Some(42),
        ..Default::default()
    };

    // Baseline: centroid material, to be overridden per candidate.
    let case = SimulationCase::<Relaxation>::new(
        Slab {
            materials: vec![wood_fibre(0.05, 1750.0, 4.75e-11)],
        },
        climate,
        initial,
        (),
    );

    let start = Instant::now();
    let mut engine = IdentificationEngine::from_table(config, Relaxation, case, &table)?;
    let result = engine.run_with_callback(|progress| {
        if progress.generation % 10 == 0 && progress.generation > 0 {
            println!(
                "  Generation {:>4}: best fitness = {:.6e}",
                progress.generation, progress.best_fitness
            );
        }
    })?;
    let elapsed = start.elapsed();

    let report = engine.report(&result);
    println!();
    println!("Stop reason:    {:?}", result.stats.stop_reason);
    println!("Generations:    {}", result.stats.generations);
    println!("Evaluations:    {}", result.stats.total_evaluations);
    println!("Elapsed:        {:.2}s", elapsed.as_secs_f64());
    println!("Best fitness:   {:.6e}", report.best_fitness);
    for (tag, value) in report.tags.iter().zip(&report.best_physical) {
        println!("  {:<24} {:.6e}", tag, value);
    }

    let truth_normalized = engine.schema().to_normalized(&TRUTH);
    let distance = truth_normalized
        .iter()
        .zip(&report.best_normalized)
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt();
    println!("Normalized distance to truth: {:.3e}", distance);

    let out = std::env::temp_dir().join("hygro-iden-synthetic-wall");
    report.write_to_dir(&out)?;
    println!("\nReport written to {}", out.display());

    Ok(())
}
