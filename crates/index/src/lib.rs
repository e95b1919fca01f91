//! # probefp Index (`index`)
//!
//! Storage side of the probe-fingerprint engine: occlusion-bucketed sorted
//! sample indices, color statistics, per-model fingerprints and the
//! [`FingerprintDatabase`] that owns them.
//!
//! ## Key Concepts
//!
//! - [`SortedIndex`] keeps samples in `(occlusion, distance, color)` order and
//!   [`BucketedIndex`] adds an O(1) lookup from occlusion level to index range.
//! - [`SampledModel`] aggregates every sampled instance of one model. New
//!   instances are queued and merged on compile.
//! - [`ColorStats`] turns color frequencies into message lengths so rare colors
//!   can weigh more during matching.
//! - Caches are versioned files (see [`FORMAT_VERSION`]); any mismatch fails
//!   the load instead of attempting an upgrade.
//!
//! ## Example Usage
//!
//! ```
//! use index::{FingerprintDatabase, IndexConfig};
//! use sample::{LabColor, Probe, RawSample, SampleConfig, Transform};
//!
//! let cfg = IndexConfig::default()
//!     .with_sample(SampleConfig::default().with_samples_per_probe(4));
//! let mut db = FingerprintDatabase::new(cfg).unwrap();
//!
//! let probes = vec![Probe::new([0.0; 3], 0), Probe::new([1.0, 0.0, 0.0], 0)];
//! let raw = vec![
//!     RawSample::new(1, 2.5, LabColor::new(40, 0, 0)),
//!     RawSample::new(3, 0.5, LabColor::new(40, 0, 0)),
//! ];
//! db.add_instance_probes(1001, Transform::identity(), 1.0, &probes, &raw).unwrap();
//! assert!(db.is_empty(1001));
//!
//! db.compile_all().unwrap();
//! assert_eq!(db.model_by_scene(1001).unwrap().total_weight(), 2);
//! ```

mod database;
mod idmap;
mod model;
mod persist;
mod sorted;
mod stats;

pub use crate::database::FingerprintDatabase;
pub use crate::idmap::{IdMap, LocalId, SceneId};
pub use crate::model::{InstanceRecord, SampledInstance, SampledModel};
pub use crate::persist::{QueryRecording, DATABASE_MAGIC, FORMAT_VERSION, RECORDING_MAGIC};
pub use crate::sorted::{BucketedIndex, SortedIndex};
pub use crate::stats::{ColorStats, DEFAULT_COLOR_BINS};

use bincode::error::{DecodeError, EncodeError};
use sample::{SampleConfig, SampleError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config for building and persisting a database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub sample: SampleConfig,
    /// Quantization per color axis for [`ColorStats`] (1..=16).
    pub color_bins: u8,
    /// Zstd level for cache files (1-22).
    pub compression_level: i32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            sample: SampleConfig::default(),
            color_bins: DEFAULT_COLOR_BINS,
            compression_level: 3,
        }
    }
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample(mut self, sample: SampleConfig) -> Self {
        self.sample = sample;
        self
    }

    pub fn with_color_bins(mut self, bins: u8) -> Self {
        self.color_bins = bins;
        self
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        self.sample.validate()?;
        if !(1..=16).contains(&self.color_bins) {
            return Err(IndexError::InvalidArgument(format!(
                "color_bins must be in 1..=16, got {}",
                self.color_bins
            )));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(IndexError::InvalidArgument(format!(
                "compression_level must be in 1..=22, got {}",
                self.compression_level
            )));
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("cache format version {found} does not match expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },
    #[error("not a cache file of the expected kind")]
    BadMagic,
    #[error("unknown model {0}")]
    UnknownModel(u32),
    #[error("instance resolution {found} differs from model resolution {expected}; clear the model first")]
    ResolutionMismatch { expected: f32, found: f32 },
    #[error("I/O error: {0}")]
    Io(String),
    #[error("serialization encode error: {0}")]
    Encode(String),
    #[error("serialization decode error: {0}")]
    Decode(String),
    #[error("compression error: {0}")]
    Zstd(String),
    #[error(transparent)]
    Sample(#[from] SampleError),
}

impl From<EncodeError> for IndexError {
    fn from(e: EncodeError) -> Self {
        IndexError::Encode(e.to_string())
    }
}

impl From<DecodeError> for IndexError {
    fn from(e: DecodeError) -> Self {
        IndexError::Decode(e.to_string())
    }
}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(IndexConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_settings_rejected() {
        assert!(IndexConfig::new().with_color_bins(0).validate().is_err());
        assert!(IndexConfig::new().with_color_bins(17).validate().is_err());
        assert!(IndexConfig::new().with_compression_level(0).validate().is_err());
        let bad_sample = SampleConfig::default().with_samples_per_probe(0);
        assert!(matches!(
            IndexConfig::new().with_sample(bad_sample).validate(),
            Err(IndexError::Sample(_))
        ));
    }
}
