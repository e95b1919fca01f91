//! Error types produced by the sample crate.
//!
//! Every variant describes a rejected input batch; nothing here is transient,
//! so callers should fix the batch rather than retry it.

use thiserror::Error;

/// Reasons a measurement batch or sampling configuration is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    /// `samples_per_probe` must be at least one ray.
    #[error("samples_per_probe must be >= 1")]
    InvalidSamplesPerProbe,

    /// The batch had samples but no probes to attach them to.
    #[error("sample batch has {samples} samples but no probes")]
    NoProbes { samples: usize },

    /// Raw samples must be a whole number of measurements per probe.
    #[error("{samples} raw samples cannot be split evenly across {probes} probes")]
    UnevenBatch { samples: usize, probes: usize },

    /// A sample reported more blocked rays than were cast.
    #[error("sample {index} has occlusion {occlusion}, above samples_per_probe {max}")]
    OcclusionOutOfRange { index: usize, occlusion: u16, max: u16 },

    /// Hit distances must be finite and non-negative.
    #[error("sample {index} has invalid distance {distance}")]
    InvalidDistance { index: usize, distance: f32 },

    /// A probe referenced a direction the geometry does not define.
    #[error("probe {index} uses direction {direction}, geometry defines {available}")]
    UnknownDirection {
        index: usize,
        direction: u8,
        available: usize,
    },

    /// Sampling resolution must be a positive finite number.
    #[error("invalid sampling resolution {0}")]
    InvalidResolution(f32),

    /// Orientation index outside the geometry's rotation table.
    #[error("orientation {orientation} out of range (geometry defines {available})")]
    UnknownOrientation { orientation: usize, available: usize },
}
