//! Benchmarks for CMA-ES sampling/adaptation and objective evaluation.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use hygro_iden::{
    compute::{
        ChannelObservations, Field, Geometry, SensorObservations, SensorSeries, SimulationCase,
        SimulationError, TransportModel,
        identification::{
            CandidateMaterializer, CmaEs, ObjectiveEvaluator, ParameterSchema, SearchStrategy,
        },
    },
    schema::{
        CmaEsConfig, Material, MaterialParameter, MaterialSearchSpace, ParameterBound, PropertySet,
    },
};

#[derive(Clone)]
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

/// Exponential relaxation toward the exterior state, rate set by the
/// installed diffusivity.
struct Relaxation;

impl TransportModel for Relaxation {
    type Geometry = Slab;
    type Climate = ();
    type InitialState = ();
    type Schedule = ();
    type Solution = f64;

    fn simulate(&self, geometry: &Slab, _: &(), _: &(), _: &()) -> Result<f64, SimulationError> {
        let m = &geometry.materials[0];
        Ok(m.conductivity.lambda_0 / (m.density * m.capacity.cp_0))
    }

    fn extract_series(&self, rate: &f64, field: Field, location: f64, times: &[f64]) -> Vec<f64> {
        let (start, end) = match field {
            Field::Temperature => (20.0, 5.0),
            Field::RelativeHumidity => (0.5, 0.8),
        };
        times
            .iter()
            .map(|t| end + (start - end) * (-rate * t / location.powi(2)).exp())
            .collect()
    }

    fn extract_heat_flux(&self, rate: &f64, _: &Slab, _: &(), location: f64, times: &[f64]) -> Vec<f64> {
        times.iter().map(|t| 15.0 * (-rate * t / location.powi(2)).exp()).collect()
    }
}

fn properties() -> PropertySet {
    PropertySet {
        lambda_0: 0.05,
        lambda_m: 0.2,
        lambda_t: 1e-4,
        cp_0: 1800.0,
        cp_t: 5.0,
        dp_p1: 5e-11,
        dp_p2: 8e-11,
        xi_p1: 20.0,
        xi_p2: 25.0,
        xi_p3: 60.0,
    }
}

fn bench_cma_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("cma_generation");

    for dimension in [3, 9, 27] {
        let config = CmaEsConfig::default();
        let mut cma = CmaEs::new(&vec![0.5; dimension], &config, 42);

        group.bench_with_input(
            BenchmarkId::from_parameter(dimension),
            &dimension,
            |b, _| {
                b.iter(|| {
                    let population = cma.generate();
                    let fitnesses: Vec<f64> = population
                        .iter()
                        .map(|x| x.iter().map(|v| (v - 0.3).powi(2)).sum())
                        .collect();
                    cma.update(black_box(&population), black_box(&fitnesses));
                });
            },
        );
    }

    group.finish();
}

fn bench_objective(c: &mut Criterion) {
    let mut group = c.benchmark_group("objective_evaluation");

    for samples in [100, 1_000, 10_000] {
        let times: Vec<f64> = (0..samples).map(|i| i as f64 * 600.0).collect();
        let slab = Slab {
            materials: vec![Material::new("wood fibre", 150.0, &properties())],
        };
        let model = Relaxation;
        let rate = model.simulate(&slab, &(), &(), &()).unwrap_or_default();

        let observations = SensorObservations::new(
            times.clone(),
            ChannelObservations::new(vec![SensorSeries::new(
                "T_12",
                0.12,
                0.1,
                model.extract_series(&rate, Field::Temperature, 0.12, &times),
            )]),
            ChannelObservations::new(vec![SensorSeries::new(
                "HR_12",
                0.12,
                0.01,
                model.extract_series(&rate, Field::RelativeHumidity, 0.12, &times),
            )]),
            ChannelObservations::new(vec![SensorSeries::new(
                "FLX_8",
                0.08,
                0.1,
                model.extract_heat_flux(&rate, &slab, &(), 0.08, &times),
            )]),
        )
        .expect("valid observations");

        let schema = ParameterSchema::new(&[MaterialSearchSpace {
            material: 0,
            parameters: vec![
                ParameterBound::new(MaterialParameter::Lambda0, 0.02, 0.08),
                ParameterBound::new(MaterialParameter::Cp0, 1000.0, 2500.0),
            ],
        }])
        .expect("valid schema");
        let materializer =
            CandidateMaterializer::new(Arc::new(schema), &slab).expect("valid materializer");
        let evaluator = ObjectiveEvaluator::new(
            Arc::new(model),
            Arc::new(SimulationCase::<Relaxation>::new(slab, (), (), ())),
            materializer,
            observations,
            100.0,
        );

        group.bench_with_input(BenchmarkId::from_parameter(samples), &samples, |b, _| {
            b.iter(|| evaluator.evaluate(black_box(&[0.4, 0.6])));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cma_generation, bench_objective);
criterion_main!(benches);
