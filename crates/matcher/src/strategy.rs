//! Scoring policies shared by the four query kinds.
//!
//! A kind is a [`Strategy`] (what is counted) paired with a [`Weighting`]
//! (how much each matched sample counts). Both are evaluated by the same
//! scan; only the accumulator and the final normalization differ.

use index::{BucketedIndex, ColorStats, SampledModel};
use roaring::RoaringBitmap;
use sample::{rotate, CompressedSample, ProbeGeometry};

use crate::scan::{scan, Accumulator};
use crate::types::{MatchError, Placement, QueryKind, Tolerance};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Mutual bag-of-samples coverage.
    Coverage,
    /// Coverage plus an orientation and offset vote.
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    /// Every uncompressed sample counts once.
    Uniform,
    /// Samples count by the message length of their color.
    MessageLength,
}

impl QueryKind {
    pub fn strategy(self) -> Strategy {
        match self {
            QueryKind::Plain | QueryKind::Importance => Strategy::Coverage,
            QueryKind::Full | QueryKind::ImportanceFull => Strategy::Configuration,
        }
    }

    pub fn weighting(self) -> Weighting {
        match self {
            QueryKind::Plain | QueryKind::Full => Weighting::Uniform,
            QueryKind::Importance | QueryKind::ImportanceFull => Weighting::MessageLength,
        }
    }
}

/// Weight of each color bucket on one side of a match.
pub(crate) struct BucketWeights<'a> {
    stats: &'a ColorStats,
    /// `None` for uniform weighting.
    table: Option<Vec<f64>>,
}

impl<'a> BucketWeights<'a> {
    pub(crate) fn new(
        weighting: Weighting,
        stats: &'a ColorStats,
        reference: Option<&ColorStats>,
    ) -> Self {
        let table = match weighting {
            Weighting::Uniform => None,
            Weighting::MessageLength => Some(stats.message_length_table(reference)),
        };
        Self { stats, table }
    }

    #[inline]
    pub(crate) fn sample(&self, sample: &CompressedSample) -> f64 {
        match &self.table {
            None => sample.weight as f64,
            Some(table) => sample.weight as f64 * table[self.stats.bucket(&sample.color)],
        }
    }

    /// Total weight of a per-bucket count histogram.
    pub(crate) fn histogram(&self, counts: &[u64]) -> f64 {
        match &self.table {
            None => counts.iter().sum::<u64>() as f64,
            Some(table) => counts
                .iter()
                .zip(table)
                .filter(|(c, _)| **c > 0)
                .map(|(&c, ml)| c as f64 * ml)
                .sum(),
        }
    }

    /// Weight of every sample in `stats`.
    pub(crate) fn total(&self) -> f64 {
        self.histogram(self.stats.counts())
    }

    fn matched(&self, samples: &[CompressedSample], matched: &RoaringBitmap) -> (f64, u64) {
        let mut counts = vec![0u64; self.stats.bucket_count()];
        let mut raw = 0u64;
        for i in matched {
            let s = &samples[i as usize];
            counts[self.stats.bucket(&s.color)] += s.weight as u64;
            raw += s.weight as u64;
        }
        (self.histogram(&counts), raw)
    }
}

#[derive(Default)]
struct CoverageAccumulator {
    db: RoaringBitmap,
    query: RoaringBitmap,
}

impl Accumulator for CoverageAccumulator {
    fn on_match(&mut self, db_index: usize, query_index: usize, _: &CompressedSample, _: &CompressedSample) {
        self.db.insert(db_index as u32);
        self.query.insert(query_index as u32);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Coverage {
    /// Uncompressed database samples matched at least once.
    pub num_matches: u64,
    pub probe_fraction: f64,
    pub query_fraction: f64,
}

impl Coverage {
    pub(crate) fn score(&self) -> f64 {
        self.probe_fraction * self.query_fraction
    }
}

fn fraction(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        (part / total).min(1.0)
    } else {
        0.0
    }
}

/// Mutual coverage of a model's merged index and the query index.
pub(crate) fn coverage(
    db: &BucketedIndex,
    query: &BucketedIndex,
    tolerance: &Tolerance,
    db_weights: &BucketWeights<'_>,
    db_total: f64,
    query_weights: &BucketWeights<'_>,
    query_total: f64,
) -> Result<Coverage, MatchError> {
    let mut acc = CoverageAccumulator::default();
    scan(db, query, tolerance, &mut acc)?;
    let (db_matched, num_matches) = db_weights.matched(db.as_slice(), &acc.db);
    let (query_matched, _) = query_weights.matched(query.as_slice(), &acc.query);
    Ok(Coverage {
        num_matches,
        probe_fraction: fraction(db_matched, db_total),
        query_fraction: fraction(query_matched, query_total),
    })
}

/// Largest vote grid one candidate may allocate (128 MiB of `f64`).
pub const MAX_VOTE_CELLS: usize = 1 << 24;

/// Integer box of query grid cells, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GridBox {
    min: [i32; 3],
    dims: [usize; 3],
}

impl GridBox {
    pub(crate) fn around(points: &[[i32; 3]]) -> Option<Self> {
        let first = points.first()?;
        let (mut lo, mut hi) = (*first, *first);
        for p in points {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(p[axis]);
                hi[axis] = hi[axis].max(p[axis]);
            }
        }
        let span = |axis: usize| (hi[axis] as i64 - lo[axis] as i64) as usize + 1;
        let dims = [span(0), span(1), span(2)];
        Some(Self { min: lo, dims })
    }

    /// Cell count, saturating at `usize::MAX`.
    pub(crate) fn volume(&self) -> usize {
        self.dims[0]
            .saturating_mul(self.dims[1])
            .saturating_mul(self.dims[2])
    }

    #[inline]
    fn cell(&self, p: [i32; 3]) -> Option<usize> {
        let mut idx = [0usize; 3];
        for axis in 0..3 {
            let rel = p[axis] - self.min[axis];
            if rel < 0 || rel as usize >= self.dims[axis] {
                return None;
            }
            idx[axis] = rel as usize;
        }
        Some((idx[2] * self.dims[1] + idx[1]) * self.dims[0] + idx[0])
    }

    fn position(&self, cell: usize) -> [i32; 3] {
        let x = cell % self.dims[0];
        let y = (cell / self.dims[0]) % self.dims[1];
        let z = cell / (self.dims[0] * self.dims[1]);
        [
            self.min[0] + x as i32,
            self.min[1] + y as i32,
            self.min[2] + z as i32,
        ]
    }
}

/// Votes for where the model's grid center lands in the query grid.
struct VoteAccumulator<'a> {
    query_grid: &'a [[i32; 3]],
    rotated: &'a [[i32; 3]],
    weights: &'a BucketWeights<'a>,
    bounds: GridBox,
    votes: &'a mut [f64],
}

impl Accumulator for VoteAccumulator<'_> {
    fn on_match(&mut self, _: usize, _: usize, d: &CompressedSample, q: &CompressedSample) {
        let qp = self.query_grid[q.probe as usize];
        let mp = self.rotated[d.probe as usize];
        let offset = [qp[0] - mp[0], qp[1] - mp[1], qp[2] - mp[2]];
        if let Some(cell) = self.bounds.cell(offset) {
            self.votes[cell] += self.weights.sample(d);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Configuration {
    pub score: f64,
    pub placement: Option<Placement>,
    pub orientation_scores: Vec<f32>,
}

/// Search every orientation of `model` for the offset with the most votes.
///
/// `query_directions[d]` holds the query samples whose probe looks along
/// direction `d`; `query_grid` are the query probes' grid positions at the
/// model's resolution.
#[allow(clippy::too_many_arguments)]
pub(crate) fn configuration(
    model: &SampledModel,
    geometry: &dyn ProbeGeometry,
    query_directions: &[BucketedIndex],
    query_grid: &[[i32; 3]],
    tolerance: &Tolerance,
    db_weights: &BucketWeights<'_>,
    db_total: f64,
    resolution: f32,
) -> Result<Configuration, MatchError> {
    let Some(bounds) = GridBox::around(query_grid) else {
        return Ok(Configuration {
            score: 0.0,
            placement: None,
            orientation_scores: Vec::new(),
        });
    };
    let cells = bounds.volume();
    if cells > MAX_VOTE_CELLS {
        return Err(MatchError::VoteGridTooLarge {
            cells,
            limit: MAX_VOTE_CELLS,
        });
    }
    let mut votes = vec![0.0f64; cells];
    let mut orientation_scores = Vec::with_capacity(model.orientation_count());
    let mut best: Option<(usize, usize, f64)> = None;

    for orientation in 0..model.orientation_count() {
        votes.iter_mut().for_each(|v| *v = 0.0);
        let permutation = geometry.direction_permutation(orientation)?;
        let mut acc = VoteAccumulator {
            query_grid,
            rotated: model.rotated_positions(orientation),
            weights: db_weights,
            bounds,
            votes: &mut votes,
        };
        for (direction, db_sub) in model.direction_indices().iter().enumerate() {
            if db_sub.is_empty() {
                continue;
            }
            let Some(query_sub) = permutation
                .get(direction)
                .and_then(|&d| query_directions.get(d as usize))
            else {
                continue;
            };
            scan(db_sub, query_sub, tolerance, &mut acc)?;
        }

        let (cell, count) = votes
            .iter()
            .enumerate()
            .fold((0, 0.0f64), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        orientation_scores.push(fraction(count, db_total) as f32);
        if count > 0.0 && best.is_none_or(|(_, _, c)| count > c) {
            best = Some((orientation, cell, count));
        }
    }

    let Some((orientation, cell, count)) = best else {
        return Ok(Configuration {
            score: 0.0,
            placement: None,
            orientation_scores,
        });
    };
    let rotation = geometry.rotation(orientation)?;
    let center_at = bounds.position(cell);
    let turned = rotate(&rotation, model.grid_center());
    let translation = [
        (center_at[0] - turned[0]) as f32 * resolution,
        (center_at[1] - turned[1]) as f32 * resolution,
        (center_at[2] - turned[2]) as f32 * resolution,
    ];
    Ok(Configuration {
        score: fraction(count, db_total),
        placement: Some(Placement {
            orientation,
            rotation,
            translation,
        }),
        orientation_scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_strategy_and_weighting() {
        assert_eq!(QueryKind::Plain.strategy(), Strategy::Coverage);
        assert_eq!(QueryKind::Importance.weighting(), Weighting::MessageLength);
        assert_eq!(QueryKind::Full.strategy(), Strategy::Configuration);
        assert_eq!(QueryKind::Full.weighting(), Weighting::Uniform);
        assert_eq!(QueryKind::ImportanceFull.strategy(), Strategy::Configuration);
        assert_eq!(QueryKind::ImportanceFull.weighting(), Weighting::MessageLength);
    }

    #[test]
    fn grid_box_cells_roundtrip_positions() {
        let bounds = GridBox::around(&[[-1, 0, 2], [3, 2, 2], [0, 1, 5]]).unwrap();
        assert_eq!(bounds.volume(), 5 * 3 * 4);
        for p in [[-1, 0, 2], [3, 2, 5], [1, 1, 3]] {
            let cell = bounds.cell(p).unwrap();
            assert_eq!(bounds.position(cell), p);
        }
        assert_eq!(bounds.cell([4, 0, 2]), None);
        assert_eq!(bounds.cell([0, -1, 2]), None);
        assert!(GridBox::around(&[]).is_none());
        let wide = GridBox::around(&[[i32::MIN, i32::MIN, i32::MIN], [i32::MAX; 3]]).unwrap();
        assert_eq!(wide.volume(), usize::MAX);
    }

    #[test]
    fn uniform_weights_count_raw_samples() {
        let stats = ColorStats::new(4);
        let weights = BucketWeights::new(Weighting::Uniform, &stats, None);
        let s = CompressedSample::from_raw(
            sample::RawSample::new(0, 1.0, sample::LabColor::new(0, 0, 0)),
            7,
            0,
        );
        assert_eq!(weights.sample(&s), 7.0);
        assert_eq!(weights.histogram(&[1, 2, 3]), 6.0);
    }

    #[test]
    fn message_length_total_matches_cached_global_length() {
        let samples: Vec<CompressedSample> = (0..20)
            .map(|i| {
                CompressedSample::from_raw(
                    sample::RawSample::new(0, i as f32, sample::LabColor::new((i * 10) as i8, 0, 0)),
                    1 + i % 3,
                    0,
                )
            })
            .collect();
        let stats = ColorStats::from_samples(8, &samples);
        let mut global = stats.clone();
        global.add(&ColorStats::from_samples(8, &samples[..5])).unwrap();
        let weights = BucketWeights::new(Weighting::MessageLength, &stats, Some(&global));
        assert_eq!(weights.total(), stats.global_message_length(&global));
    }
}
