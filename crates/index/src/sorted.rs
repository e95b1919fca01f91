//! Sorted fingerprint indices and their occlusion bucket tables.
//!
//! [`SortedIndex`] keeps samples in `(occlusion, distance, color)` order.
//! [`BucketedIndex`] adds a lower-bound table over occlusion levels so the
//! matcher can fetch every sample of a level window in O(1).

use std::ops::Range;

use sample::CompressedSample;
use serde::{Deserialize, Serialize};

use crate::IndexError;

/// Samples ordered by [`CompressedSample::cmp_key`]. Equal keys keep their
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortedIndex {
    samples: Vec<CompressedSample>,
}

impl SortedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `samples` and sort them.
    pub fn from_samples(samples: Vec<CompressedSample>) -> Self {
        let mut index = Self { samples };
        index.sort();
        index
    }

    /// Stable in-place sort by the index order.
    pub fn sort(&mut self) {
        self.samples.sort_by(|a, b| a.cmp_key(b));
    }

    /// Binary merge of two sorted indices. On equal keys `a` comes first.
    pub fn merge(a: &SortedIndex, b: &SortedIndex) -> SortedIndex {
        let (left, right) = (&a.samples, &b.samples);
        let mut out = Vec::with_capacity(left.len() + right.len());
        let (mut i, mut j) = (0, 0);
        while i < left.len() && j < right.len() {
            if right[j].cmp_key(&left[i]).is_lt() {
                out.push(right[j]);
                j += 1;
            } else {
                out.push(left[i]);
                i += 1;
            }
        }
        out.extend_from_slice(&left[i..]);
        out.extend_from_slice(&right[j..]);
        SortedIndex { samples: out }
    }

    /// Concatenate every input in order, then run one stable sort.
    ///
    /// Merges happen in batch at compile time, so a single sort is preferred
    /// over a k-way tournament.
    pub fn merge_multiple(inputs: &[&SortedIndex]) -> Result<SortedIndex, IndexError> {
        if inputs.len() < 2 {
            return Err(IndexError::InvalidArgument(format!(
                "merge_multiple needs at least 2 inputs, got {}",
                inputs.len()
            )));
        }
        let total = inputs.iter().map(|i| i.len()).sum();
        let mut samples = Vec::with_capacity(total);
        for input in inputs {
            samples.extend_from_slice(&input.samples);
        }
        Ok(SortedIndex::from_samples(samples))
    }

    /// Copy of `range`, re-sorted distance first. Debug tooling only.
    pub fn subset_by_distance(&self, range: Range<usize>) -> Vec<CompressedSample> {
        let start = range.start.min(self.samples.len());
        let end = range.end.clamp(start, self.samples.len());
        let mut out = self.samples[start..end].to_vec();
        out.sort_by(|a, b| a.cmp_distance_first(b));
        out
    }

    pub fn is_sorted(&self) -> bool {
        self.samples
            .windows(2)
            .all(|w| !w[1].cmp_key(&w[0]).is_lt())
    }

    /// Sum of sample weights, i.e. the uncompressed sample count.
    pub fn total_weight(&self) -> u64 {
        self.samples.iter().map(|s| s.weight as u64).sum()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[CompressedSample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompressedSample> {
        self.samples.iter()
    }
}

/// A [`SortedIndex`] plus `samples_per_probe + 2` occlusion lower bounds.
///
/// `buckets[l]` is the position of the first sample with occlusion `>= l`;
/// the last entry equals `len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketedIndex {
    index: SortedIndex,
    buckets: Vec<u32>,
    samples_per_probe: u16,
}

impl BucketedIndex {
    pub fn new(index: SortedIndex, samples_per_probe: u16) -> Self {
        let mut out = Self {
            index,
            buckets: Vec::new(),
            samples_per_probe,
        };
        out.rebuild_buckets();
        out
    }

    pub fn empty(samples_per_probe: u16) -> Self {
        Self::new(SortedIndex::new(), samples_per_probe)
    }

    /// Recompute the bucket table in one pass over the sorted samples.
    pub fn rebuild_buckets(&mut self) {
        let levels = self.samples_per_probe as usize + 1;
        let mut buckets = vec![0u32; levels + 1];
        let samples = self.index.as_slice();
        let mut pos = 0usize;
        for (level, slot) in buckets.iter_mut().enumerate().take(levels) {
            while pos < samples.len() && (samples[pos].occlusion as usize) < level {
                pos += 1;
            }
            *slot = pos as u32;
        }
        debug_assert!(
            samples
                .last()
                .is_none_or(|s| s.occlusion <= self.samples_per_probe),
            "occlusion above samples_per_probe"
        );
        buckets[levels] = samples.len() as u32;
        self.buckets = buckets;
    }

    /// Replace the underlying samples and rebuild the table.
    pub fn replace(&mut self, index: SortedIndex) {
        self.index = index;
        self.rebuild_buckets();
    }

    /// `[begin, end)` of the samples with exactly `level` blocked rays.
    #[inline]
    pub fn occlusion_range(&self, level: u16) -> Range<usize> {
        self.occlusion_span(level, level)
    }

    /// `[begin, end)` of the samples with occlusion in `lo..=hi`, clamped to
    /// the valid levels.
    #[inline]
    pub fn occlusion_span(&self, lo: u16, hi: u16) -> Range<usize> {
        let max = self.samples_per_probe;
        if lo > max || lo > hi {
            return 0..0;
        }
        let hi = hi.min(max);
        self.buckets[lo as usize] as usize..self.buckets[hi as usize + 1] as usize
    }

    /// Order-preserving sub-index of the samples accepted by `keep`.
    pub fn filter<F>(&self, mut keep: F) -> BucketedIndex
    where
        F: FnMut(&CompressedSample) -> bool,
    {
        let samples = self.index.iter().copied().filter(|s| keep(s)).collect();
        BucketedIndex::new(SortedIndex { samples }, self.samples_per_probe)
    }

    pub fn buckets(&self) -> &[u32] {
        &self.buckets
    }

    pub fn samples_per_probe(&self) -> u16 {
        self.samples_per_probe
    }

    pub fn index(&self) -> &SortedIndex {
        &self.index
    }

    pub fn as_slice(&self) -> &[CompressedSample] {
        self.index.as_slice()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
