//! One logical model's fingerprint, aggregated from its sampled instances.
//!
//! Instances are queued by [`SampledModel::enqueue`] and folded into the
//! merged index by [`SampledModel::compile`]. Queries only ever read the
//! compiled state.

use sample::{rotate, CompressedSample, Probe, ProbeGeometry, SampleError, Transform};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sorted::{BucketedIndex, SortedIndex};
use crate::stats::ColorStats;
use crate::IndexError;

/// A placed object's probes and compressed samples, waiting to be merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledInstance {
    pub transform: Transform,
    pub resolution: f32,
    pub probes: Vec<Probe>,
    /// Sample `probe` fields index into `probes`.
    pub samples: Vec<CompressedSample>,
}

/// Provenance of an instance that has been merged into the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub transform: Transform,
    pub resolution: f32,
    /// First model-level probe index owned by this instance.
    pub probe_offset: u32,
    pub probe_count: u32,
    /// Uncompressed sample count contributed.
    pub sample_weight: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledModel {
    pending: Vec<SampledInstance>,
    instances: Vec<InstanceRecord>,
    resolution: Option<f32>,
    probes: Vec<Probe>,
    grid: Vec<[i32; 3]>,
    grid_center: [i32; 3],
    merged: BucketedIndex,
    direction_indices: Vec<BucketedIndex>,
    /// `rotated[o][p]`: grid position of probe `p` under orientation `o`,
    /// relative to `grid_center`.
    rotated: Vec<Vec<[i32; 3]>>,
    stats: ColorStats,
    total_weight: u64,
    message_length: f64,
}

impl SampledModel {
    pub fn new(samples_per_probe: u16, color_bins: u8) -> Self {
        Self {
            pending: Vec::new(),
            instances: Vec::new(),
            resolution: None,
            probes: Vec::new(),
            grid: Vec::new(),
            grid_center: [0; 3],
            merged: BucketedIndex::empty(samples_per_probe),
            direction_indices: Vec::new(),
            rotated: Vec::new(),
            stats: ColorStats::new(color_bins),
            total_weight: 0,
            message_length: 0.0,
        }
    }

    /// Queue an instance for the next [`Self::compile`].
    ///
    /// All instances of a model must share one sampling resolution; re-sample
    /// at a new resolution by calling [`Self::clear`] first.
    pub fn enqueue(&mut self, instance: SampledInstance) -> Result<(), IndexError> {
        let resolution = instance.resolution;
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(SampleError::InvalidResolution(resolution).into());
        }
        let current = self
            .resolution
            .or_else(|| self.pending.first().map(|p| p.resolution));
        if let Some(expected) = current {
            if (expected - resolution).abs() > f32::EPSILON * expected {
                return Err(IndexError::ResolutionMismatch {
                    expected,
                    found: resolution,
                });
            }
        }
        self.pending.push(instance);
        Ok(())
    }

    /// Merge queued instances into the index and rebuild derived tables.
    ///
    /// Returns `false` when nothing was queued; the model is then untouched.
    pub fn compile(&mut self, geometry: &dyn ProbeGeometry) -> Result<bool, IndexError> {
        if self.pending.is_empty() {
            return Ok(false);
        }
        let pending = std::mem::take(&mut self.pending);
        let mut parts = Vec::with_capacity(pending.len());
        for instance in pending {
            let offset = self.probes.len() as u32;
            let mut samples = instance.samples;
            for sample in &mut samples {
                sample.probe += offset;
            }
            let part = SortedIndex::from_samples(samples);
            self.grid.extend(
                instance
                    .probes
                    .iter()
                    .map(|p| p.grid_position(instance.resolution)),
            );
            self.probes.extend_from_slice(&instance.probes);
            self.instances.push(InstanceRecord {
                transform: instance.transform,
                resolution: instance.resolution,
                probe_offset: offset,
                probe_count: instance.probes.len() as u32,
                sample_weight: part.total_weight(),
            });
            self.resolution.get_or_insert(instance.resolution);
            parts.push(part);
        }

        let merged = if parts.len() == 1 {
            SortedIndex::merge(self.merged.index(), &parts[0])
        } else {
            let mut inputs: Vec<&SortedIndex> = Vec::with_capacity(parts.len() + 1);
            inputs.push(self.merged.index());
            inputs.extend(parts.iter());
            SortedIndex::merge_multiple(&inputs)?
        };
        self.merged.replace(merged);

        let probes = &self.probes;
        self.direction_indices = (0..geometry.directions().len())
            .map(|d| {
                self.merged
                    .filter(|s| probes[s.probe as usize].direction as usize == d)
            })
            .collect();

        self.grid_center = grid_center(&self.grid);
        self.rotated = Vec::with_capacity(geometry.orientation_count());
        for orientation in 0..geometry.orientation_count() {
            let rotation = geometry.rotation(orientation)?;
            let c = self.grid_center;
            self.rotated.push(
                self.grid
                    .iter()
                    .map(|g| rotate(&rotation, [g[0] - c[0], g[1] - c[1], g[2] - c[2]]))
                    .collect(),
            );
        }

        self.stats.clear();
        self.stats.accumulate(self.merged.as_slice());
        self.total_weight = self.merged.index().total_weight();
        debug!(
            samples = self.merged.len(),
            total_weight = self.total_weight,
            probes = self.probes.len(),
            entropy = self.stats.entropy(),
            "model_compiled"
        );
        Ok(true)
    }

    /// Recompute the cached message length against the database-wide stats.
    pub fn refresh_message_length(&mut self, global: &ColorStats) {
        self.message_length = self.stats.global_message_length(global);
    }

    /// Drop all queued and merged data.
    pub fn clear(&mut self) {
        *self = Self::new(self.merged.samples_per_probe(), self.stats.bins_per_axis());
    }

    pub fn index(&self) -> &BucketedIndex {
        &self.merged
    }

    pub fn direction_index(&self, direction: usize) -> Option<&BucketedIndex> {
        self.direction_indices.get(direction)
    }

    pub fn direction_indices(&self) -> &[BucketedIndex] {
        &self.direction_indices
    }

    /// Rotated probe grid positions for `orientation`, empty before compile.
    pub fn rotated_positions(&self, orientation: usize) -> &[[i32; 3]] {
        self.rotated
            .get(orientation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn orientation_count(&self) -> usize {
        self.rotated.len()
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub fn grid_positions(&self) -> &[[i32; 3]] {
        &self.grid
    }

    pub fn grid_center(&self) -> [i32; 3] {
        self.grid_center
    }

    pub fn stats(&self) -> &ColorStats {
        &self.stats
    }

    /// Uncompressed sample count of the merged index.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Cached total message length against the database-wide stats.
    pub fn message_length(&self) -> f64 {
        self.message_length
    }

    pub fn resolution(&self) -> Option<f32> {
        self.resolution
    }

    pub fn instances(&self) -> &[InstanceRecord] {
        &self.instances
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// True iff the merged index holds no samples.
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }
}

fn grid_center(grid: &[[i32; 3]]) -> [i32; 3] {
    let Some(first) = grid.first() else {
        return [0; 3];
    };
    let (mut lo, mut hi) = (*first, *first);
    for g in grid {
        for axis in 0..3 {
            lo[axis] = lo[axis].min(g[axis]);
            hi[axis] = hi[axis].max(g[axis]);
        }
    }
    [
        (lo[0] + hi[0]).div_euclid(2),
        (lo[1] + hi[1]).div_euclid(2),
        (lo[2] + hi[2]).div_euclid(2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sample::{compress, CubeGeometry, LabColor, RawSample, SampleConfig};

    fn instance(probe_count: usize, distance_base: f32, resolution: f32) -> SampledInstance {
        let probes: Vec<Probe> = (0..probe_count)
            .map(|i| Probe::new([i as f32 * resolution, 0.0, 0.0], (i % 26) as u8))
            .collect();
        let raw: Vec<RawSample> = (0..probe_count)
            .map(|i| RawSample::new((i % 5) as u16, distance_base + i as f32, LabColor::new(i as i8, 0, 0)))
            .collect();
        let cfg = SampleConfig::default().with_samples_per_probe(8);
        SampledInstance {
            transform: Transform::identity(),
            resolution,
            samples: compress(probes.len(), &raw, &cfg).unwrap(),
            probes,
        }
    }

    #[test]
    fn compile_merges_queue_and_builds_tables() {
        let geometry = CubeGeometry::new();
        let mut model = SampledModel::new(8, 8);
        model.enqueue(instance(30, 0.0, 0.5)).unwrap();
        model.enqueue(instance(20, 100.0, 0.5)).unwrap();
        assert!(model.is_empty());
        assert!(model.compile(&geometry).unwrap());

        assert_eq!(model.index().len(), 50);
        assert!(model.index().index().is_sorted());
        assert_eq!(model.total_weight(), 50);
        assert_eq!(model.pending_count(), 0);
        assert_eq!(model.instances().len(), 2);
        assert_eq!(model.instances()[1].probe_offset, 30);
        assert_eq!(model.orientation_count(), 24);
        assert_eq!(model.rotated_positions(0).len(), 50);
        let per_direction: usize = model.direction_indices().iter().map(|d| d.len()).sum();
        assert_eq!(per_direction, 50);
        assert!(model.index().as_slice().iter().all(|s| (s.probe as usize) < model.probes().len()));
        assert_eq!(model.stats().total(), 50);
    }

    #[test]
    fn second_compile_with_empty_queue_is_noop() {
        let geometry = CubeGeometry::new();
        let mut model = SampledModel::new(8, 8);
        model.enqueue(instance(10, 0.0, 1.0)).unwrap();
        model.compile(&geometry).unwrap();
        let before = model.clone();
        assert!(!model.compile(&geometry).unwrap());
        assert_eq!(model, before);
    }

    #[test]
    fn incremental_compile_single_merge_path() {
        let geometry = CubeGeometry::new();
        let mut model = SampledModel::new(8, 8);
        model.enqueue(instance(10, 0.0, 1.0)).unwrap();
        model.compile(&geometry).unwrap();
        model.enqueue(instance(10, 5.0, 1.0)).unwrap();
        model.compile(&geometry).unwrap();
        assert_eq!(model.index().len(), 20);
        assert!(model.index().index().is_sorted());
        assert_eq!(*model.index().buckets().last().unwrap(), 20);
    }

    #[test]
    fn identity_orientation_is_centered_grid() {
        let geometry = CubeGeometry::new();
        let mut model = SampledModel::new(8, 8);
        model.enqueue(instance(5, 0.0, 1.0)).unwrap();
        model.compile(&geometry).unwrap();
        assert_eq!(model.grid_center(), [2, 0, 0]);
        assert_eq!(model.rotated_positions(0)[0], [-2, 0, 0]);
        assert_eq!(model.rotated_positions(0)[4], [2, 0, 0]);
    }

    #[test]
    fn resolution_mismatch_rejected_until_clear() {
        let mut model = SampledModel::new(8, 8);
        model.enqueue(instance(4, 0.0, 1.0)).unwrap();
        let err = model.enqueue(instance(4, 0.0, 0.5)).expect_err("mismatch");
        assert!(matches!(err, IndexError::ResolutionMismatch { .. }));
        model.clear();
        assert!(model.enqueue(instance(4, 0.0, 0.5)).is_ok());
        assert!(model.enqueue(instance(4, 0.0, f32::NAN)).is_err());
    }
}
