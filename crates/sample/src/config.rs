//! Sampling configuration.

use serde::{Deserialize, Serialize};

use crate::error::SampleError;

/// Configuration shared by everything that produces or consumes samples.
///
/// Indices built with different `samples_per_probe` values have different
/// bucket tables and cannot be matched against each other.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleConfig {
    /// Configuration schema version.
    pub version: u32,
    /// Number of rays cast per probe; occlusion counts lie in `[0, samples_per_probe]`.
    pub samples_per_probe: u16,
}

impl SampleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples_per_probe(mut self, samples_per_probe: u16) -> Self {
        self.samples_per_probe = samples_per_probe;
        self
    }

    pub fn validate(&self) -> Result<(), SampleError> {
        if self.samples_per_probe == 0 {
            return Err(SampleError::InvalidSamplesPerProbe);
        }
        Ok(())
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            version: 1,
            samples_per_probe: 16,
        }
    }
}
