//! Turning a normalized individual into simulation-ready materials.

use std::sync::Arc;

use crate::compute::Geometry;
use crate::schema::{Material, PropertySet};

use super::{IdentificationError, ParameterSchema};

/// Builds candidate material lists from the baseline materials.
///
/// The baseline is captured once at construction and never mutated; every
/// call works on fresh copies.
#[derive(Debug, Clone)]
pub struct CandidateMaterializer {
    schema: Arc<ParameterSchema>,
    baseline_materials: Vec<Material>,
    /// Baseline properties of each slot, in slot order.
    baseline_properties: Vec<PropertySet>,
}

impl CandidateMaterializer {
    /// Capture the baseline from the geometry's installed materials.
    pub fn new<G: Geometry>(
        schema: Arc<ParameterSchema>,
        geometry: &G,
    ) -> Result<Self, IdentificationError> {
        Self::from_materials(schema, geometry.materials().to_vec())
    }

    pub fn from_materials(
        schema: Arc<ParameterSchema>,
        baseline_materials: Vec<Material>,
    ) -> Result<Self, IdentificationError> {
        schema.check_material_count(baseline_materials.len())?;
        let baseline_properties = schema
            .slots()
            .iter()
            .map(|slot| baseline_materials[slot.material].properties())
            .collect();

        Ok(Self {
            schema,
            baseline_materials,
            baseline_properties,
        })
    }

    pub fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    /// Baseline materials, in geometry order.
    pub fn baseline_materials(&self) -> &[Material] {
        &self.baseline_materials
    }

    /// Full material list for `individual`: identified materials rebuilt,
    /// all others copied from the baseline.
    pub fn materialize(&self, individual: &[f64]) -> Result<Vec<Material>, IdentificationError> {
        self.schema.check_dimension(individual)?;

        let mut materials = self.baseline_materials.clone();
        for (i, slot) in self.schema.slots().iter().enumerate() {
            let props = self.schema.denormalize(
                i,
                &individual[slot.indices.clone()],
                &self.baseline_properties[i],
            )?;
            materials[slot.material].apply(&props);
        }
        Ok(materials)
    }

    /// Clone `template` and install the candidate's materials into the copy.
    ///
    /// The template itself is left untouched, so concurrent evaluations can
    /// share it.
    pub fn install<G: Geometry>(
        &self,
        template: &G,
        individual: &[f64],
    ) -> Result<G, IdentificationError> {
        let materials = self.materialize(individual)?;
        let mut geometry = template.clone();
        geometry.install_materials(materials);
        Ok(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MaterialParameter, MaterialSearchSpace, ParameterBound};

    #[derive(Debug, Clone)]
    struct Wall {
        materials: Vec<Material>,
    }

    impl Geometry for Wall {
        fn materials(&self) -> &[Material] {
            &self.materials
        }

        fn install_materials(&mut self, materials: Vec<Material>) {
            self.materials = materials;
        }
    }

    fn props(lambda_0: f64) -> PropertySet {
        PropertySet {
            lambda_0,
            lambda_m: 0.2,
            lambda_t: 1e-4,
            cp_0: 1000.0,
            cp_t: 10.0,
            dp_p1: 5e-11,
            dp_p2: 8e-11,
            xi_p1: 20.0,
            xi_p2: 25.0,
            xi_p3: 60.0,
        }
    }

    fn wall() -> Wall {
        Wall {
            materials: vec![
                Material::new("plaster", 1200.0, &props(0.5)),
                Material::new("wood fibre", 150.0, &props(0.04)),
                Material::new("render", 1800.0, &props(0.8)),
            ],
        }
    }

    fn materializer() -> CandidateMaterializer {
        let schema = ParameterSchema::new(&[MaterialSearchSpace {
            material: 1,
            parameters: vec![
                ParameterBound::new(MaterialParameter::Lambda0, 0.02, 0.08),
                ParameterBound::new(MaterialParameter::XiP2, 10.0, 40.0),
            ],
        }])
        .unwrap();
        CandidateMaterializer::new(Arc::new(schema), &wall()).unwrap()
    }

    #[test]
    fn test_materialize_overrides_identified_only() {
        let m = materializer();
        let materials = m.materialize(&[0.5, 1.0]).unwrap();

        assert_eq!(materials.len(), 3);
        assert_eq!(materials[0], wall().materials[0]);
        assert_eq!(materials[2], wall().materials[2]);

        let identified = materials[1].properties();
        assert!((identified.lambda_0 - 0.05).abs() < 1e-12);
        assert_eq!(identified.xi_p2, 40.0);
        assert_eq!(identified.cp_0, 1000.0);
        assert_eq!(materials[1].name, "wood fibre");
    }

    #[test]
    fn test_materialize_is_side_effect_free() {
        let m = materializer();
        let first = m.materialize(&[0.0, 0.0]).unwrap();
        let _second = m.materialize(&[1.0, 1.0]).unwrap();

        assert_eq!(m.baseline_materials(), wall().materials.as_slice());
        assert_eq!(first[1].properties().lambda_0, 0.02);
    }

    #[test]
    fn test_install_leaves_template_untouched() {
        let m = materializer();
        let template = wall();
        let installed = m.install(&template, &[1.0, 0.0]).unwrap();

        assert!((installed.materials[1].properties().lambda_0 - 0.08).abs() < 1e-12);
        assert_eq!(template.materials[1].properties().lambda_0, 0.04);
    }

    #[test]
    fn test_wrong_dimension() {
        let m = materializer();
        assert!(matches!(
            m.materialize(&[0.5]),
            Err(IdentificationError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_material_out_of_range() {
        let schema = ParameterSchema::new(&[MaterialSearchSpace {
            material: 5,
            parameters: vec![ParameterBound::new(MaterialParameter::Cp0, 1.0, 2.0)],
        }])
        .unwrap();
        let result = CandidateMaterializer::new(Arc::new(schema), &wall());
        assert!(matches!(result, Err(IdentificationError::Config(_))));
    }
}
