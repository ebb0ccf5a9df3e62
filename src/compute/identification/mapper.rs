//! Mapping between normalized individuals and physical material properties.
//!
//! An individual concatenates one value per identified parameter, material
//! by material in configuration order. Each value maps affinely onto its
//! search interval, `physical = low + n * (high - low)`, without clamping:
//! the strategy is free to overshoot `[0, 1]`.

use std::ops::Range;

use crate::schema::{ConfigError, MaterialSearchSpace, ParameterBound, PropertySet};

use super::IdentificationError;

/// Physical value of a normalized coordinate.
#[inline]
pub fn denormalize_value(normalized: f64, low: f64, high: f64) -> f64 {
    low + normalized * (high - low)
}

/// Normalized coordinate of a physical value. Exact inverse of
/// [`denormalize_value`]; requires `low != high`.
#[inline]
pub fn normalize_value(physical: f64, low: f64, high: f64) -> f64 {
    (physical - low) / (high - low)
}

/// Contiguous index ranges from per-material parameter counts.
pub fn partition(counts: &[usize]) -> Vec<Range<usize>> {
    let mut start = 0;
    counts
        .iter()
        .map(|&count| {
            let range = start..start + count;
            start += count;
            range
        })
        .collect()
}

/// Search space of one material, resolved to its slice of the individual.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialSlot {
    /// Index of the material in the geometry's material list.
    pub material: usize,
    /// Identified parameters, in individual order.
    pub parameters: Vec<ParameterBound>,
    /// Indices of this material's values in the individual.
    pub indices: Range<usize>,
}

/// Resolved parameter layout of a run.
///
/// Built once from the configuration; index ranges are computed here and
/// never again.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSchema {
    slots: Vec<MaterialSlot>,
    dimension: usize,
}

impl ParameterSchema {
    /// Resolve the search spaces. Fails on degenerate or duplicate bounds.
    pub fn new(spaces: &[MaterialSearchSpace]) -> Result<Self, ConfigError> {
        for space in spaces {
            space.validate()?;
        }
        let mut materials: Vec<usize> = spaces.iter().map(|s| s.material).collect();
        materials.sort_unstable();
        if let Some(w) = materials.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::DuplicateMaterial(w[0]));
        }

        let counts: Vec<usize> = spaces.iter().map(|s| s.parameters.len()).collect();
        let slots: Vec<MaterialSlot> = spaces
            .iter()
            .zip(partition(&counts))
            .map(|(space, indices)| MaterialSlot {
                material: space.material,
                parameters: space.parameters.clone(),
                indices,
            })
            .collect();
        let dimension = counts.iter().sum();

        Ok(Self { slots, dimension })
    }

    /// Individual length.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn slots(&self) -> &[MaterialSlot] {
        &self.slots
    }

    /// Index range of every material, in slot order.
    pub fn partition(&self) -> Vec<Range<usize>> {
        self.slots.iter().map(|s| s.indices.clone()).collect()
    }

    /// Every parameter bound, in individual order.
    pub fn bounds(&self) -> impl Iterator<Item = &ParameterBound> {
        self.slots.iter().flat_map(|s| s.parameters.iter())
    }

    /// Midpoint of every interval: the initial guess.
    pub fn centroid(&self) -> Vec<f64> {
        vec![0.5; self.dimension]
    }

    /// Check that every slot names an existing material.
    pub fn check_material_count(&self, count: usize) -> Result<(), ConfigError> {
        match self.slots.iter().find(|s| s.material >= count) {
            Some(slot) => Err(ConfigError::MaterialOutOfRange {
                index: slot.material,
                count,
            }),
            None => Ok(()),
        }
    }

    /// Fail unless `individual` has exactly [`Self::dimension`] values.
    pub fn check_dimension(&self, individual: &[f64]) -> Result<(), IdentificationError> {
        if individual.len() == self.dimension {
            Ok(())
        } else {
            Err(IdentificationError::DimensionMismatch {
                expected: self.dimension,
                found: individual.len(),
            })
        }
    }

    /// Physical properties of slot `slot` for its normalized values.
    ///
    /// Parameters the slot does not identify are copied from `baseline`.
    pub fn denormalize(
        &self,
        slot: usize,
        normalized: &[f64],
        baseline: &PropertySet,
    ) -> Result<PropertySet, IdentificationError> {
        let slot = self
            .slots
            .get(slot)
            .ok_or(IdentificationError::SlotOutOfRange {
                slot,
                count: self.slots.len(),
            })?;
        if normalized.len() != slot.parameters.len() {
            return Err(IdentificationError::DimensionMismatch {
                expected: slot.parameters.len(),
                found: normalized.len(),
            });
        }

        let mut props = *baseline;
        for (bound, &n) in slot.parameters.iter().zip(normalized) {
            props.set(bound.name, denormalize_value(n, bound.low, bound.high));
        }
        Ok(props)
    }

    /// Physical value of every coordinate, in individual order.
    pub fn to_physical(&self, individual: &[f64]) -> Vec<f64> {
        self.bounds()
            .zip(individual)
            .map(|(b, &n)| denormalize_value(n, b.low, b.high))
            .collect()
    }

    /// Normalized coordinates of physical values, in individual order.
    pub fn to_normalized(&self, physical: &[f64]) -> Vec<f64> {
        self.bounds()
            .zip(physical)
            .map(|(b, &v)| normalize_value(v, b.low, b.high))
            .collect()
    }

    /// `material.parameter` tag of every coordinate, in individual order.
    pub fn tags(&self, material_names: &[String]) -> Vec<String> {
        self.slots
            .iter()
            .flat_map(|slot| {
                let prefix = material_names
                    .get(slot.material)
                    .cloned()
                    .unwrap_or_else(|| format!("material_{}", slot.material));
                slot.parameters
                    .iter()
                    .map(move |b| format!("{}.{}", prefix, b.name))
            })
            .collect()
    }
}
