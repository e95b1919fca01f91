//! Color histograms and the message-length importance weights derived from them.
//!
//! Each component of a [`LabColor`] is quantized into `bins_per_axis` bins,
//! giving `bins³` buckets. A sample's message length is `-log2(p)` of its
//! bucket, so rare colors weigh more than common ones.

use sample::{CompressedSample, LabColor};
use serde::{Deserialize, Serialize};

use crate::IndexError;

/// Default quantization per color axis.
pub const DEFAULT_COLOR_BINS: u8 = 8;

/// Weighted histogram over quantized color space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStats {
    bins_per_axis: u8,
    counts: Vec<u64>,
    total: u64,
}

impl ColorStats {
    pub fn new(bins_per_axis: u8) -> Self {
        let bins = bins_per_axis.max(1);
        let buckets = bins as usize * bins as usize * bins as usize;
        Self {
            bins_per_axis: bins,
            counts: vec![0; buckets],
            total: 0,
        }
    }

    /// Histogram of a sample set.
    pub fn from_samples<'a, I>(bins_per_axis: u8, samples: I) -> Self
    where
        I: IntoIterator<Item = &'a CompressedSample>,
    {
        let mut stats = Self::new(bins_per_axis);
        stats.accumulate(samples);
        stats
    }

    pub fn bins_per_axis(&self) -> u8 {
        self.bins_per_axis
    }

    pub fn bucket_count(&self) -> usize {
        self.counts.len()
    }

    /// Total accumulated weight.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Bucket a color falls into.
    #[inline]
    pub fn bucket(&self, color: &LabColor) -> usize {
        let bins = self.bins_per_axis as usize;
        let axis = |c: i8| ((c as i16 + 128) as usize * bins) >> 8;
        let [l, a, b] = color.components();
        (axis(l) * bins + axis(a)) * bins + axis(b)
    }

    /// Add every sample's weight to its color bucket.
    pub fn accumulate<'a, I>(&mut self, samples: I)
    where
        I: IntoIterator<Item = &'a CompressedSample>,
    {
        for sample in samples {
            let bucket = self.bucket(&sample.color);
            self.counts[bucket] += sample.weight as u64;
            self.total += sample.weight as u64;
        }
    }

    /// Fold another histogram with the same binning into this one.
    pub fn add(&mut self, other: &ColorStats) -> Result<(), IndexError> {
        if self.bins_per_axis != other.bins_per_axis || self.counts.len() != other.counts.len() {
            return Err(IndexError::InvalidArgument(format!(
                "cannot add a {}-bin histogram to a {}-bin one",
                other.bins_per_axis, self.bins_per_axis
            )));
        }
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            *mine += theirs;
        }
        self.total += other.total;
        Ok(())
    }

    /// Check a decoded histogram: `bins_per_axis` bins per axis, `bins³`
    /// buckets, and a total equal to the bucket sum.
    pub fn validate(&self, bins_per_axis: u8) -> Result<(), IndexError> {
        let bins = bins_per_axis as usize;
        if self.bins_per_axis != bins_per_axis || self.counts.len() != bins * bins * bins {
            return Err(IndexError::Decode(format!(
                "color histogram has {} bins per axis and {} buckets, expected {}",
                self.bins_per_axis,
                self.counts.len(),
                bins_per_axis
            )));
        }
        let sum = self
            .counts
            .iter()
            .try_fold(0u64, |acc, &c| acc.checked_add(c));
        if sum != Some(self.total) {
            return Err(IndexError::Decode(format!(
                "color histogram total {} does not match its buckets",
                self.total
            )));
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.total = 0;
    }

    /// Shannon entropy (bits) of the normalized histogram.
    pub fn entropy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let total = self.total as f64;
        self.counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / total;
                -p * p.log2()
            })
            .sum()
    }

    /// Add-one smoothed probability of `bucket`.
    #[inline]
    pub fn probability(&self, bucket: usize) -> f64 {
        (self.counts[bucket] as f64 + 1.0) / (self.total as f64 + self.counts.len() as f64)
    }

    fn bucket_message_length(&self, bucket: usize, reference: Option<&ColorStats>) -> f64 {
        let p = match reference {
            Some(other) => 0.5 * (self.probability(bucket) + other.probability(bucket)),
            None => self.probability(bucket),
        };
        -p.log2()
    }

    /// `-log2(p)` of the color's bucket, blended with `reference` when given.
    pub fn message_length(&self, color: &LabColor, reference: Option<&ColorStats>) -> f64 {
        self.bucket_message_length(self.bucket(color), reference)
    }

    /// Per-bucket message lengths, for lookups inside hot loops.
    pub fn message_length_table(&self, reference: Option<&ColorStats>) -> Vec<f64> {
        (0..self.counts.len())
            .map(|bucket| self.bucket_message_length(bucket, reference))
            .collect()
    }

    /// Total message length of this histogram's samples, each measured with
    /// [`Self::message_length`] against `reference`.
    pub fn global_message_length(&self, reference: &ColorStats) -> f64 {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(bucket, &c)| c as f64 * self.bucket_message_length(bucket, Some(reference)))
            .sum()
    }
}

impl Default for ColorStats {
    fn default() -> Self {
        Self::new(DEFAULT_COLOR_BINS)
    }
}
