//! Material property model for coupled heat and moisture transport.
//!
//! A [`Material`] carries the curves the transport model reads:
//! conductivity and heat capacity as affine laws, vapour permeability as an
//! interpolation table and the sorption isotherm as a slope table over
//! relative humidity. The identifiable scalars behind those curves are
//! enumerated by [`MaterialParameter`] and collected in a [`PropertySet`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Relative humidity points of the vapour permeability table.
pub const PERMEABILITY_HR: [f64; 2] = [0.25, 0.75];

/// Relative humidity points of the sorption isotherm slope table.
pub const ISOTHERM_HR: [f64; 3] = [0.25, 0.5, 0.75];

/// Identifiable scalar of a material.
///
/// The set is closed: a search space can only name these parameters, and
/// each one maps onto exactly one material curve setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialParameter {
    /// Dry conductivity (W/m/K).
    #[serde(rename = "lambda_0")]
    Lambda0,
    /// Conductivity slope with moisture content.
    #[serde(rename = "lambda_m")]
    LambdaM,
    /// Conductivity slope with temperature.
    #[serde(rename = "lambda_t")]
    LambdaT,
    /// Dry specific heat (J/kg/K).
    #[serde(rename = "cp_0")]
    Cp0,
    /// Specific heat slope with temperature.
    #[serde(rename = "cp_t")]
    CpT,
    /// Vapour permeability at the first humidity point.
    DpP1,
    /// Vapour permeability at the second humidity point.
    DpP2,
    /// Isotherm slope at the first humidity point.
    XiP1,
    /// Isotherm slope at the second humidity point.
    XiP2,
    /// Isotherm slope at the third humidity point.
    XiP3,
}

impl MaterialParameter {
    /// Every identifiable parameter, in canonical order.
    pub const ALL: [MaterialParameter; 10] = [
        Self::Lambda0,
        Self::LambdaM,
        Self::LambdaT,
        Self::Cp0,
        Self::CpT,
        Self::DpP1,
        Self::DpP2,
        Self::XiP1,
        Self::XiP2,
        Self::XiP3,
    ];

    /// Name used in configuration and result files.
    pub fn name(self) -> &'static str {
        match self {
            Self::Lambda0 => "lambda_0",
            Self::LambdaM => "lambda_m",
            Self::LambdaT => "lambda_t",
            Self::Cp0 => "cp_0",
            Self::CpT => "cp_t",
            Self::DpP1 => "dp_p1",
            Self::DpP2 => "dp_p2",
            Self::XiP1 => "xi_p1",
            Self::XiP2 => "xi_p2",
            Self::XiP3 => "xi_p3",
        }
    }
}

impl fmt::Display for MaterialParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for MaterialParameter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| format!("unknown material parameter '{}'", s))
    }
}

/// Full set of identifiable scalars of one material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropertySet {
    pub lambda_0: f64,
    pub lambda_m: f64,
    pub lambda_t: f64,
    pub cp_0: f64,
    pub cp_t: f64,
    pub dp_p1: f64,
    pub dp_p2: f64,
    pub xi_p1: f64,
    pub xi_p2: f64,
    pub xi_p3: f64,
}

impl PropertySet {
    /// Read one parameter.
    pub fn get(&self, parameter: MaterialParameter) -> f64 {
        match parameter {
            MaterialParameter::Lambda0 => self.lambda_0,
            MaterialParameter::LambdaM => self.lambda_m,
            MaterialParameter::LambdaT => self.lambda_t,
            MaterialParameter::Cp0 => self.cp_0,
            MaterialParameter::CpT => self.cp_t,
            MaterialParameter::DpP1 => self.dp_p1,
            MaterialParameter::DpP2 => self.dp_p2,
            MaterialParameter::XiP1 => self.xi_p1,
            MaterialParameter::XiP2 => self.xi_p2,
            MaterialParameter::XiP3 => self.xi_p3,
        }
    }

    /// Overwrite one parameter.
    pub fn set(&mut self, parameter: MaterialParameter, value: f64) {
        let slot = match parameter {
            MaterialParameter::Lambda0 => &mut self.lambda_0,
            MaterialParameter::LambdaM => &mut self.lambda_m,
            MaterialParameter::LambdaT => &mut self.lambda_t,
            MaterialParameter::Cp0 => &mut self.cp_0,
            MaterialParameter::CpT => &mut self.cp_t,
            MaterialParameter::DpP1 => &mut self.dp_p1,
            MaterialParameter::DpP2 => &mut self.dp_p2,
            MaterialParameter::XiP1 => &mut self.xi_p1,
            MaterialParameter::XiP2 => &mut self.xi_p2,
            MaterialParameter::XiP3 => &mut self.xi_p3,
        };
        *slot = value;
    }
}

/// Conductivity law `lambda = lambda_0 + lambda_m * w + lambda_t * T`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Conductivity {
    pub lambda_0: f64,
    pub lambda_m: f64,
    pub lambda_t: f64,
}

impl Conductivity {
    /// Evaluate at moisture content `w` (kg/m3) and temperature `t` (degC).
    pub fn at(&self, w: f64, t: f64) -> f64 {
        self.lambda_0 + self.lambda_m * w + self.lambda_t * t
    }
}

/// Heat capacity law `cp = cp_0 + cp_t * T`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatCapacity {
    pub cp_0: f64,
    pub cp_t: f64,
}

impl HeatCapacity {
    pub fn at(&self, t: f64) -> f64 {
        self.cp_0 + self.cp_t * t
    }
}

/// Piecewise-linear table over relative humidity.
///
/// Values outside the first and last knot are held constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumidityTable {
    pub hr: Vec<f64>,
    pub values: Vec<f64>,
}

impl HumidityTable {
    pub fn new(hr: &[f64], values: &[f64]) -> Self {
        debug_assert_eq!(hr.len(), values.len());
        Self {
            hr: hr.to_vec(),
            values: values.to_vec(),
        }
    }

    /// Linear interpolation at relative humidity `hr`.
    ///
    /// Only knots with both a position and a value are used. An empty
    /// table evaluates to 0.
    pub fn at(&self, hr: f64) -> f64 {
        let n = self.hr.len().min(self.values.len());
        let (knots, values) = (&self.hr[..n], &self.values[..n]);
        let (Some(&first), Some(&last)) = (knots.first(), knots.last()) else {
            return 0.0;
        };
        if hr <= first {
            return values[0];
        }
        if hr >= last {
            return values[n - 1];
        }
        let i = knots.partition_point(|&x| x <= hr).max(1) - 1;
        let t = (hr - knots[i]) / (knots[i + 1] - knots[i]);
        values[i] + t * (values[i + 1] - values[i])
    }
}

/// A homogeneous layer material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Display name, used to tag result files.
    pub name: String,
    /// Dry density (kg/m3).
    pub density: f64,
    pub conductivity: Conductivity,
    pub capacity: HeatCapacity,
    /// Vapour permeability (s) interpolated over relative humidity.
    pub vapor_permeability: HumidityTable,
    /// Isotherm slope dw/dHR (kg/m3) over relative humidity.
    pub isotherm: HumidityTable,
}

impl Material {
    /// Build a material whose curves are driven by `props`.
    pub fn new(name: impl Into<String>, density: f64, props: &PropertySet) -> Self {
        let mut material = Self {
            name: name.into(),
            density,
            conductivity: Conductivity {
                lambda_0: 0.0,
                lambda_m: 0.0,
                lambda_t: 0.0,
            },
            capacity: HeatCapacity {
                cp_0: 0.0,
                cp_t: 0.0,
            },
            vapor_permeability: HumidityTable::new(&PERMEABILITY_HR, &[0.0; 2]),
            isotherm: HumidityTable::new(&ISOTHERM_HR, &[0.0; 3]),
        };
        material.apply(props);
        material
    }

    pub fn set_conductivity(&mut self, lambda_0: f64, lambda_m: f64, lambda_t: f64) {
        self.conductivity = Conductivity {
            lambda_0,
            lambda_m,
            lambda_t,
        };
    }

    pub fn set_capacity(&mut self, cp_0: f64, cp_t: f64) {
        self.capacity = HeatCapacity { cp_0, cp_t };
    }

    /// Replace the permeability table; `hr` and `dp` must have equal length.
    pub fn set_vapor_permeability(&mut self, hr: &[f64], dp: &[f64]) {
        self.vapor_permeability = HumidityTable::new(hr, dp);
    }

    /// Replace the isotherm slope table; `hr` and `xi` must have equal length.
    pub fn set_isotherm(&mut self, hr: &[f64], xi: &[f64]) {
        self.isotherm = HumidityTable::new(hr, xi);
    }

    /// Push every scalar of `props` through the curve setters.
    pub fn apply(&mut self, props: &PropertySet) {
        self.set_conductivity(props.lambda_0, props.lambda_m, props.lambda_t);
        self.set_capacity(props.cp_0, props.cp_t);
        self.set_vapor_permeability(&PERMEABILITY_HR, &[props.dp_p1, props.dp_p2]);
        self.set_isotherm(&ISOTHERM_HR, &[props.xi_p1, props.xi_p2, props.xi_p3]);
    }

    /// Snapshot of the identifiable scalars.
    ///
    /// Tables are read at their own knots, so a material built from a
    /// property set returns that same set.
    pub fn properties(&self) -> PropertySet {
        PropertySet {
            lambda_0: self.conductivity.lambda_0,
            lambda_m: self.conductivity.lambda_m,
            lambda_t: self.conductivity.lambda_t,
            cp_0: self.capacity.cp_0,
            cp_t: self.capacity.cp_t,
            dp_p1: self.vapor_permeability.at(PERMEABILITY_HR[0]),
            dp_p2: self.vapor_permeability.at(PERMEABILITY_HR[1]),
            xi_p1: self.isotherm.at(ISOTHERM_HR[0]),
            xi_p2: self.isotherm.at(ISOTHERM_HR[1]),
            xi_p3: self.isotherm.at(ISOTHERM_HR[2]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wood_fibre() -> PropertySet {
        PropertySet {
            lambda_0: 0.04,
            lambda_m: 0.2,
            lambda_t: 1e-4,
            cp_0: 1200.0,
            cp_t: 12.0,
            dp_p1: 4e-11,
            dp_p2: 8e-11,
            xi_p1: 17.0,
            xi_p2: 20.0,
            xi_p3: 50.0,
        }
    }

    #[test]
    fn test_properties_roundtrip() {
        let props = wood_fibre();
        let material = Material::new("wood fibre", 150.0, &props);
        assert_eq!(material.properties(), props);
    }

    #[test]
    fn test_set_and_get() {
        let mut props = wood_fibre();
        for (i, p) in MaterialParameter::ALL.iter().enumerate() {
            props.set(*p, i as f64);
        }
        for (i, p) in MaterialParameter::ALL.iter().enumerate() {
            assert_eq!(props.get(*p), i as f64);
        }
    }

    #[test]
    fn test_table_interpolation() {
        let table = HumidityTable::new(&ISOTHERM_HR, &[10.0, 20.0, 40.0]);
        assert_eq!(table.at(0.0), 10.0);
        assert_eq!(table.at(0.5), 20.0);
        assert!((table.at(0.625) - 30.0).abs() < 1e-12);
        assert_eq!(table.at(0.99), 40.0);
    }

    #[test]
    fn test_mismatched_table_does_not_panic() {
        let empty: HumidityTable = serde_json::from_str(r#"{"hr":[0.25,0.75],"values":[]}"#).unwrap();
        assert_eq!(empty.at(0.1), 0.0);
        assert_eq!(empty.at(0.9), 0.0);

        let short = HumidityTable {
            hr: vec![0.25, 0.75, 0.9],
            values: vec![1.0, 3.0],
        };
        assert_eq!(short.at(0.1), 1.0);
        assert_eq!(short.at(0.5), 2.0);
        assert_eq!(short.at(0.95), 3.0);
    }

    #[test]
    fn test_parameter_display_pads() {
        assert_eq!(format!("{:<10}|", MaterialParameter::Cp0), "cp_0      |");
        assert_eq!(format!("{:>8}", MaterialParameter::XiP3), "   xi_p3");
    }

    #[test]
    fn test_parameter_names() {
        for p in MaterialParameter::ALL {
            assert_eq!(p.name().parse::<MaterialParameter>().unwrap(), p);
            let json = serde_json::to_string(&p).unwrap();
            assert_eq!(json, format!("\"{}\"", p.name()));
        }
        assert!("lambda_x".parse::<MaterialParameter>().is_err());
    }

    #[test]
    fn test_conductivity_law() {
        let material = Material::new("m", 100.0, &wood_fibre());
        let lambda = material.conductivity.at(10.0, 20.0);
        assert!((lambda - (0.04 + 2.0 + 2e-3)).abs() < 1e-12);
        assert!((material.capacity.at(10.0) - 1320.0).abs() < 1e-9);
    }
}
