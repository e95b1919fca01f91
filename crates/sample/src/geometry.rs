//! Probe geometry: neighbor directions, discrete orientations, probe grids.
//!
//! The matcher only needs three things from the geometry: the direction table
//! probes index into, the rotation for each discrete orientation, and how
//! that rotation permutes the direction table. [`CubeGeometry`] provides the
//! voxel-neighborhood version of all three.

use crate::error::SampleError;
use crate::types::Probe;

/// Integer rotation matrix, row-major.
pub type Rotation = [[i32; 3]; 3];

/// Source of probe directions, orientations and probe layouts.
pub trait ProbeGeometry: Send + Sync {
    /// Unit-ish integer direction vectors; a probe's `direction` indexes this table.
    fn directions(&self) -> &[[i32; 3]];

    /// Number of discrete orientations searched by configuration queries.
    fn orientation_count(&self) -> usize;

    /// Rotation matrix for `orientation`. Orientation 0 is the identity.
    fn rotation(&self, orientation: usize) -> Result<Rotation, SampleError>;

    /// `perm[d]` is the direction index that direction `d` maps to under `orientation`.
    fn direction_permutation(&self, orientation: usize) -> Result<&[u8], SampleError>;

    /// Probes covering an integer `extent` (in cells) at `resolution` world units per cell.
    fn probes(&self, extent: [u32; 3], resolution: f32) -> Result<Vec<Probe>, SampleError>;
}

/// Rotate an integer vector.
#[inline]
pub fn rotate(rotation: &Rotation, v: [i32; 3]) -> [i32; 3] {
    let mut out = [0i32; 3];
    for (row, value) in out.iter_mut().enumerate() {
        *value = rotation[row][0] * v[0] + rotation[row][1] * v[1] + rotation[row][2] * v[2];
    }
    out
}

/// The 26 voxel-neighbor directions and the 24 proper rotations of the cube.
#[derive(Debug, Clone)]
pub struct CubeGeometry {
    directions: Vec<[i32; 3]>,
    rotations: Vec<Rotation>,
    permutations: Vec<Vec<u8>>,
}

impl CubeGeometry {
    pub fn new() -> Self {
        let directions = neighbor_directions();
        let rotations = cube_rotations();
        let permutations = rotations
            .iter()
            .map(|r| {
                directions
                    .iter()
                    .map(|&d| {
                        let rotated = rotate(r, d);
                        directions
                            .iter()
                            .position(|&candidate| candidate == rotated)
                            .unwrap_or_default() as u8
                    })
                    .collect()
            })
            .collect();

        Self {
            directions,
            rotations,
            permutations,
        }
    }

    /// Direction index of `v`, if `v` is one of the neighbor directions.
    pub fn direction_index(&self, v: [i32; 3]) -> Option<u8> {
        self.directions
            .iter()
            .position(|&d| d == v)
            .map(|i| i as u8)
    }
}

impl Default for CubeGeometry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeGeometry for CubeGeometry {
    fn directions(&self) -> &[[i32; 3]] {
        &self.directions
    }

    fn orientation_count(&self) -> usize {
        self.rotations.len()
    }

    fn rotation(&self, orientation: usize) -> Result<Rotation, SampleError> {
        self.rotations
            .get(orientation)
            .copied()
            .ok_or(SampleError::UnknownOrientation {
                orientation,
                available: self.rotations.len(),
            })
    }

    fn direction_permutation(&self, orientation: usize) -> Result<&[u8], SampleError> {
        self.permutations
            .get(orientation)
            .map(Vec::as_slice)
            .ok_or(SampleError::UnknownOrientation {
                orientation,
                available: self.permutations.len(),
            })
    }

    fn probes(&self, extent: [u32; 3], resolution: f32) -> Result<Vec<Probe>, SampleError> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(SampleError::InvalidResolution(resolution));
        }
        let cells = extent[0] as usize * extent[1] as usize * extent[2] as usize;
        let mut probes = Vec::with_capacity(cells * self.directions.len());
        for z in 0..extent[2] {
            for y in 0..extent[1] {
                for x in 0..extent[0] {
                    let position = [
                        x as f32 * resolution,
                        y as f32 * resolution,
                        z as f32 * resolution,
                    ];
                    for direction in 0..self.directions.len() {
                        probes.push(Probe::new(position, direction as u8));
                    }
                }
            }
        }
        Ok(probes)
    }
}

fn neighbor_directions() -> Vec<[i32; 3]> {
    let mut out = Vec::with_capacity(26);
    for x in -1..=1 {
        for y in -1..=1 {
            for z in -1..=1 {
                if (x, y, z) != (0, 0, 0) {
                    out.push([x, y, z]);
                }
            }
        }
    }
    out
}

// Signed permutation matrices with determinant +1, identity first.
fn cube_rotations() -> Vec<Rotation> {
    const PERMS: [([usize; 3], i32); 6] = [
        ([0, 1, 2], 1),
        ([0, 2, 1], -1),
        ([1, 0, 2], -1),
        ([1, 2, 0], 1),
        ([2, 0, 1], 1),
        ([2, 1, 0], -1),
    ];
    let mut out = Vec::with_capacity(24);
    for (perm, parity) in PERMS {
        for mask in 0..8u8 {
            let signs = [
                if mask & 1 == 0 { 1 } else { -1 },
                if mask & 2 == 0 { 1 } else { -1 },
                if mask & 4 == 0 { 1 } else { -1 },
            ];
            if parity * signs[0] * signs[1] * signs[2] != 1 {
                continue;
            }
            let mut r = [[0i32; 3]; 3];
            for row in 0..3 {
                r[row][perm[row]] = signs[row];
            }
            out.push(r);
        }
    }
    out
}
