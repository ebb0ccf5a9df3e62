//! Configuration types for an identification run.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::MaterialParameter;

/// Top-level identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentificationConfig {
    /// Search strategy settings.
    #[serde(default)]
    pub strategy: CmaEsConfig,
    /// Materials under identification, in individual order.
    pub materials: Vec<MaterialSearchSpace>,
    /// Sensor placement and instrument resolutions.
    pub sensors: SensorLayout,
    /// Penalty on drift away from the initial guess.
    #[serde(default)]
    pub regularization: RegularizationConfig,
    /// Stopping policy.
    #[serde(default)]
    pub termination: TerminationConfig,
    /// Evaluation settings (parallelism, timeout).
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            strategy: CmaEsConfig::default(),
            materials: vec![MaterialSearchSpace {
                material: 0,
                parameters: vec![
                    ParameterBound::new(MaterialParameter::Lambda0, 0.02, 0.08),
                    ParameterBound::new(MaterialParameter::LambdaM, 0.1, 0.4),
                    ParameterBound::new(MaterialParameter::LambdaT, 5e-5, 2e-4),
                    ParameterBound::new(MaterialParameter::Cp0, 500.0, 2000.0),
                    ParameterBound::new(MaterialParameter::DpP1, 2e-11, 7.5e-11),
                    ParameterBound::new(MaterialParameter::DpP2, 3e-11, 1.3e-10),
                    ParameterBound::new(MaterialParameter::XiP1, 9.0, 35.0),
                    ParameterBound::new(MaterialParameter::XiP2, 10.0, 40.0),
                    ParameterBound::new(MaterialParameter::XiP3, 25.0, 100.0),
                ],
            }],
            sensors: SensorLayout::default(),
            regularization: RegularizationConfig::default(),
            termination: TerminationConfig::default(),
            evaluation: EvaluationConfig::default(),
            random_seed: None,
        }
    }
}

/// CMA-ES configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmaEsConfig {
    /// Initial step size (sigma) in normalized units.
    #[serde(default = "default_cma_sigma")]
    pub initial_sigma: f64,
    /// Offspring per generation (lambda).
    #[serde(default = "default_population_size")]
    pub population_size: usize,
}

impl Default for CmaEsConfig {
    fn default() -> Self {
        Self {
            initial_sigma: default_cma_sigma(),
            population_size: default_population_size(),
        }
    }
}

fn default_cma_sigma() -> f64 {
    0.3
}
fn default_population_size() -> usize {
    18
}

/// Search space of one material: which parameters move, and within what.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialSearchSpace {
    /// Index of the material in the geometry's material list.
    pub material: usize,
    /// Identified parameters, in individual order.
    pub parameters: Vec<ParameterBound>,
}

impl MaterialSearchSpace {
    /// Reject duplicate names and empty or inverted intervals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for bound in &self.parameters {
            if !seen.insert(bound.name) {
                return Err(ConfigError::DuplicateParameter {
                    material: self.material,
                    parameter: bound.name,
                });
            }
            // Strict: high == low would make normalization divide by zero.
            if !(bound.low.is_finite() && bound.high.is_finite() && bound.low < bound.high) {
                return Err(ConfigError::InvalidBounds {
                    material: self.material,
                    parameter: bound.name,
                    low: bound.low,
                    high: bound.high,
                });
            }
        }
        Ok(())
    }
}

/// Closed search interval for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterBound {
    pub name: MaterialParameter,
    pub low: f64,
    pub high: f64,
}

impl ParameterBound {
    pub fn new(name: MaterialParameter, low: f64, high: f64) -> Self {
        Self { name, low, high }
    }
}

/// Where the sensors sit and how precise they are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorLayout {
    /// Name of the time column in the measurement table (seconds).
    #[serde(default = "default_time_column")]
    pub time_column: String,
    /// Combined temperature / relative humidity probes.
    #[serde(default)]
    pub probes: Vec<ProbeConfig>,
    /// Heat flux meters, placed independently of the probes.
    #[serde(default)]
    pub flux_probes: Vec<FluxProbeConfig>,
}

impl Default for SensorLayout {
    fn default() -> Self {
        Self {
            time_column: default_time_column(),
            probes: vec![ProbeConfig {
                location: 0.12,
                temperature_column: "T_12".to_string(),
                humidity_column: "HR_12".to_string(),
                temperature_resolution: default_temperature_resolution(),
                humidity_resolution: default_humidity_resolution(),
            }],
            flux_probes: vec![FluxProbeConfig {
                location: 0.08,
                column: "FLX_8".to_string(),
                resolution: default_flux_resolution(),
            }],
        }
    }
}

fn default_time_column() -> String {
    "temps (s)".to_string()
}

/// A probe recording both temperature and relative humidity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Position in the wall (m).
    pub location: f64,
    pub temperature_column: String,
    pub humidity_column: String,
    /// Instrument resolution (degC).
    #[serde(default = "default_temperature_resolution")]
    pub temperature_resolution: f64,
    /// Instrument resolution (fraction of saturation).
    #[serde(default = "default_humidity_resolution")]
    pub humidity_resolution: f64,
}

/// A heat flux meter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluxProbeConfig {
    /// Position in the wall (m).
    pub location: f64,
    pub column: String,
    /// Instrument resolution (W/m2).
    #[serde(default = "default_flux_resolution")]
    pub resolution: f64,
}

fn default_temperature_resolution() -> f64 {
    0.1
}
fn default_humidity_resolution() -> f64 {
    0.01
}
fn default_flux_resolution() -> f64 {
    0.1
}

/// Regularization toward the initial guess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegularizationConfig {
    /// Multiplier `alpha` on the mean squared deviation.
    #[serde(default = "default_regularization_weight")]
    pub weight: f64,
}

impl Default for RegularizationConfig {
    fn default() -> Self {
        Self {
            weight: default_regularization_weight(),
        }
    }
}

fn default_regularization_weight() -> f64 {
    100.0
}

/// Stopping policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminationConfig {
    /// Generation ceiling.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Converged once every parameter's |std/mean| falls below this.
    #[serde(default = "default_dispersion_threshold")]
    pub dispersion_threshold: f64,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            max_generations: default_max_generations(),
            dispersion_threshold: default_dispersion_threshold(),
        }
    }
}

fn default_max_generations() -> usize {
    2000
}
fn default_dispersion_threshold() -> f64 {
    1e-3
}

/// Evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Number of parallel evaluations (0 = auto-detect).
    #[serde(default)]
    pub parallel_workers: usize,
    /// Wall-clock limit for one simulation, in seconds.
    ///
    /// A simulation that overruns cannot be killed. Its thread keeps running
    /// detached, holding a geometry copy, until the solver returns.
    #[serde(default)]
    pub timeout_secs: Option<f64>,
    /// How many timed-out simulations may still be running before the run
    /// aborts with a simulator fault.
    #[serde(default = "default_max_stalled_simulations")]
    pub max_stalled_simulations: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 0,
            timeout_secs: None,
            max_stalled_simulations: default_max_stalled_simulations(),
        }
    }
}

fn default_max_stalled_simulations() -> usize {
    16
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 2, got {0}")]
    PopulationTooSmall(usize),
    #[error("Initial step size must be positive and finite, got {0}")]
    InvalidSigma(f64),
    #[error("Maximum generation count must be positive")]
    InvalidMaxGenerations,
    #[error("Dispersion threshold must be positive, got {0}")]
    InvalidDispersionThreshold(f64),
    #[error("Regularization weight must be non-negative, got {0}")]
    InvalidRegularization(f64),
    #[error("Evaluation timeout must be positive, got {0}")]
    InvalidTimeout(f64),
    #[error("No parameters selected for identification")]
    EmptySearchSpace,
    #[error("Material {material}: invalid bounds for {parameter}: [{low}, {high}]")]
    InvalidBounds {
        material: usize,
        parameter: MaterialParameter,
        low: f64,
        high: f64,
    },
    #[error("Material {material}: parameter {parameter} listed twice")]
    DuplicateParameter {
        material: usize,
        parameter: MaterialParameter,
    },
    #[error("Material {0} has more than one search space")]
    DuplicateMaterial(usize),
    #[error("Material index {index} out of range ({count} materials in geometry)")]
    MaterialOutOfRange { index: usize, count: usize },
    #[error("Invalid resolution {resolution} for sensor '{column}'")]
    InvalidResolution { column: String, resolution: f64 },
    #[error("No sensors configured")]
    NoSensors,
}

impl IdentificationConfig {
    /// Validate the configuration before any evaluation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategy.population_size < 2 {
            return Err(ConfigError::PopulationTooSmall(
                self.strategy.population_size,
            ));
        }
        let sigma = self.strategy.initial_sigma;
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(ConfigError::InvalidSigma(sigma));
        }
        if self.termination.max_generations == 0 {
            return Err(ConfigError::InvalidMaxGenerations);
        }
        let threshold = self.termination.dispersion_threshold;
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(ConfigError::InvalidDispersionThreshold(threshold));
        }
        let alpha = self.regularization.weight;
        if !(alpha.is_finite() && alpha >= 0.0) {
            return Err(ConfigError::InvalidRegularization(alpha));
        }
        if let Some(timeout) = self.evaluation.timeout_secs
            && !(timeout.is_finite() && timeout > 0.0)
        {
            return Err(ConfigError::InvalidTimeout(timeout));
        }

        self.validate_search_space()?;
        self.sensors.validate()
    }

    fn validate_search_space(&self) -> Result<(), ConfigError> {
        let mut seen_materials = HashSet::new();
        for space in &self.materials {
            if !seen_materials.insert(space.material) {
                return Err(ConfigError::DuplicateMaterial(space.material));
            }
            space.validate()?;
        }

        if self.parameter_count() == 0 {
            return Err(ConfigError::EmptySearchSpace);
        }
        Ok(())
    }

    /// Total number of identified parameters (individual length).
    pub fn parameter_count(&self) -> usize {
        self.materials.iter().map(|m| m.parameters.len()).sum()
    }
}

impl SensorLayout {
    /// Check resolutions and that at least one sensor exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probes.is_empty() && self.flux_probes.is_empty() {
            return Err(ConfigError::NoSensors);
        }

        let check = |column: &str, resolution: f64| {
            if resolution.is_finite() && resolution > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::InvalidResolution {
                    column: column.to_string(),
                    resolution,
                })
            }
        };

        for probe in &self.probes {
            check(&probe.temperature_column, probe.temperature_resolution)?;
            check(&probe.humidity_column, probe.humidity_resolution)?;
        }
        for probe in &self.flux_probes {
            check(&probe.column, probe.resolution)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = IdentificationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.parameter_count(), 9);
    }

    #[test]
    fn test_degenerate_bounds_rejected() {
        let mut config = IdentificationConfig::default();
        config.materials[0].parameters[0].high = config.materials[0].parameters[0].low;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let mut config = IdentificationConfig::default();
        let first = config.materials[0].parameters[0];
        config.materials[0].parameters.push(first);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateParameter { .. })
        ));
    }

    #[test]
    fn test_duplicate_material_rejected() {
        let mut config = IdentificationConfig::default();
        let space = config.materials[0].clone();
        config.materials.push(space);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateMaterial(0))
        ));
    }

    #[test]
    fn test_empty_search_space_rejected() {
        let mut config = IdentificationConfig::default();
        config.materials[0].parameters.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptySearchSpace)
        ));
    }

    #[test]
    fn test_sensor_validation() {
        let mut config = IdentificationConfig::default();
        config.sensors.flux_probes[0].resolution = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidResolution { .. })
        ));

        config.sensors.probes.clear();
        config.sensors.flux_probes.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoSensors)));
    }

    #[test]
    fn test_serialization() {
        let config = IdentificationConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: IdentificationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed.strategy.population_size,
            config.strategy.population_size
        );
        assert_eq!(parsed.materials[0].parameters, config.materials[0].parameters);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "materials": [
                { "material": 0, "parameters": [ { "name": "lambda_0", "low": 0.02, "high": 0.08 } ] }
            ],
            "sensors": {
                "probes": [ { "location": 0.12, "temperature_column": "T", "humidity_column": "HR" } ]
            }
        }"#;
        let config: IdentificationConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy.population_size, 18);
        assert_eq!(config.strategy.initial_sigma, 0.3);
        assert_eq!(config.termination.max_generations, 2000);
        assert_eq!(config.regularization.weight, 100.0);
        assert_eq!(config.sensors.probes[0].humidity_resolution, 0.01);
        assert!(config.sensors.flux_probes.is_empty());
        assert_eq!(config.evaluation.timeout_secs, None);
        assert_eq!(config.evaluation.max_stalled_simulations, 16);
    }
}
