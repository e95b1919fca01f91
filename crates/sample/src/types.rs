//! Measurement types shared by every stage of the fingerprinting pipeline.
//!
//! A [`Probe`] is where a measurement is taken, a [`RawSample`] is what the
//! renderer reported there, and a [`CompressedSample`] is the deduplicated,
//! weighted form that indices and matchers operate on.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Color in a perceptual (Lab-like) space with three small signed components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LabColor {
    pub l: i8,
    pub a: i8,
    pub b: i8,
}

impl LabColor {
    pub const fn new(l: i8, a: i8, b: i8) -> Self {
        Self { l, a, b }
    }

    /// Components as an array, in `(l, a, b)` order.
    #[inline]
    pub fn components(&self) -> [i8; 3] {
        [self.l, self.a, self.b]
    }

    /// Euclidean distance between two colors.
    #[inline]
    pub fn distance(&self, other: &LabColor) -> f32 {
        let dl = self.l as f32 - other.l as f32;
        let da = self.a as f32 - other.a as f32;
        let db = self.b as f32 - other.b as f32;
        (dl * dl + da * da + db * db).sqrt()
    }
}

/// A sampling position plus one of the geometry's neighbor directions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    /// Position in model-local world units.
    pub position: [f32; 3],
    /// Index into [`crate::ProbeGeometry::directions`].
    pub direction: u8,
}

impl Probe {
    pub fn new(position: [f32; 3], direction: u8) -> Self {
        Self {
            position,
            direction,
        }
    }

    /// Integer grid coordinate of this probe at the given sampling resolution.
    pub fn grid_position(&self, resolution: f32) -> [i32; 3] {
        [
            (self.position[0] / resolution).round() as i32,
            (self.position[1] / resolution).round() as i32,
            (self.position[2] / resolution).round() as i32,
        ]
    }
}

/// One measurement as produced by the external renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Number of blocked rays, in `[0, samples_per_probe]`.
    pub occlusion: u16,
    /// Hit distance in world units.
    pub distance: f32,
    pub color: LabColor,
}

impl RawSample {
    pub fn new(occlusion: u16, distance: f32, color: LabColor) -> Self {
        Self {
            occlusion,
            distance,
            color,
        }
    }

    /// True when both samples carry bit-identical measurements.
    #[inline]
    pub fn same_measurement(&self, other: &RawSample) -> bool {
        self.occlusion == other.occlusion
            && self.distance.to_bits() == other.distance.to_bits()
            && self.color == other.color
    }
}

/// A measurement with its multiplicity and the probe it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressedSample {
    pub occlusion: u16,
    pub distance: f32,
    pub color: LabColor,
    /// Number of raw samples folded into this one (always >= 1).
    pub weight: u32,
    /// Index of the originating probe within its owner's probe list.
    pub probe: u32,
}

impl CompressedSample {
    pub fn from_raw(raw: RawSample, weight: u32, probe: u32) -> Self {
        Self {
            occlusion: raw.occlusion,
            distance: raw.distance,
            color: raw.color,
            weight,
            probe,
        }
    }

    pub fn raw(&self) -> RawSample {
        RawSample {
            occlusion: self.occlusion,
            distance: self.distance,
            color: self.color,
        }
    }

    /// Index order: occlusion, distance, then the three color components.
    #[inline]
    pub fn cmp_key(&self, other: &Self) -> Ordering {
        self.occlusion
            .cmp(&other.occlusion)
            .then_with(|| self.distance.total_cmp(&other.distance))
            .then_with(|| self.color.components().cmp(&other.color.components()))
    }

    /// Distance-first order used by debug tooling.
    #[inline]
    pub fn cmp_distance_first(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.occlusion.cmp(&other.occlusion))
            .then_with(|| self.color.components().cmp(&other.color.components()))
    }
}

/// Rigid placement of a sampled instance: row-major rotation then translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub rotation: [[f32; 3]; 3],
    pub translation: [f32; 3],
}

impl Transform {
    pub const fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    pub fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    /// Apply the transform to a point.
    pub fn apply(&self, p: [f32; 3]) -> [f32; 3] {
        let r = &self.rotation;
        let mut out = [0.0f32; 3];
        for (row, value) in out.iter_mut().enumerate() {
            *value = r[row][0] * p[0] + r[row][1] * p[1] + r[row][2] * p[2] + self.translation[row];
        }
        out
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
