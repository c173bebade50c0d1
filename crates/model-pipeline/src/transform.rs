//! TransformBuilder: rigid translations for preview layout.

use serde::{Deserialize, Serialize};
use shape_kernel::BoundingBox;

use crate::types::Measurement;

/// Historical preview offset, in model units.
pub const DEFAULT_SEPARATION: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Axis {
    #[default]
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// A rigid 3-D translation. Never mutated after construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    vector: [f64; 3],
}

impl Transform {
    pub fn translation(vector: [f64; 3]) -> Self {
        Self { vector }
    }

    pub fn identity() -> Self {
        Self { vector: [0.0; 3] }
    }

    pub fn vector(&self) -> [f64; 3] {
        self.vector
    }
}

/// Translation by `distance` along `axis`. Any sign is allowed.
pub fn translation_along(axis: Axis, distance: f64) -> Transform {
    let mut vector = [0.0; 3];
    vector[axis.index()] = distance;
    Transform::translation(vector)
}

/// How far apart the two solids of a preview are placed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SeparationPolicy {
    /// A constant distance along the axis.
    Fixed { distance: f64 },
    /// Sum of the cube roots of both volumes, plus a margin.
    CharacteristicSize { margin: f64 },
    /// Enough to move the second solid fully past the first along the axis.
    BoundingExtent { margin: f64 },
}

impl Default for SeparationPolicy {
    fn default() -> Self {
        SeparationPolicy::Fixed {
            distance: DEFAULT_SEPARATION,
        }
    }
}

/// What a policy may look at when computing a separation.
#[derive(Debug, Clone, Copy)]
pub struct SeparationInputs {
    pub first: Measurement,
    pub second: Measurement,
    pub first_bounds: BoundingBox,
    pub second_bounds: BoundingBox,
}

impl SeparationPolicy {
    /// Offset distance along the axis for these inputs.
    pub fn distance(&self, axis: Axis, inputs: &SeparationInputs) -> f64 {
        match *self {
            SeparationPolicy::Fixed { distance } => distance,
            SeparationPolicy::CharacteristicSize { margin } => {
                inputs.first.volume.cbrt() + inputs.second.volume.cbrt() + margin
            }
            SeparationPolicy::BoundingExtent { margin } => {
                if inputs.first_bounds.is_empty() || inputs.second_bounds.is_empty() {
                    return margin;
                }
                let i = axis.index();
                (inputs.first_bounds.max[i] - inputs.second_bounds.min[i]).max(0.0) + margin
            }
        }
    }

    pub fn resolve(&self, axis: Axis, inputs: &SeparationInputs) -> Transform {
        translation_along(axis, self.distance(axis, inputs))
    }
}
