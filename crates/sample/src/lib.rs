//! # probefp Samples (`sample`)
//!
//! Measurement types and the compression pass that turns a renderer's raw
//! output into weighted, probe-attributed samples.
//!
//! ## Contract
//!
//! - A batch pairs a probe list with `k >= 1` raw samples per probe; raw sample
//!   `i` belongs to probe `i / k`.
//! - [`compress`] merges bit-identical measurements of the same probe into one
//!   [`CompressedSample`] whose `weight` is the multiplicity, so the weights of
//!   a compressed batch always sum to the raw sample count.
//! - Output order follows first appearance; sorting is the index layer's job.
//!
//! ## Example Usage
//!
//! ```
//! use sample::{compress, LabColor, RawSample, SampleConfig};
//!
//! let cfg = SampleConfig::default().with_samples_per_probe(8);
//! let color = LabColor::new(50, 0, 0);
//! let raw = vec![
//!     RawSample::new(3, 1.5, color),
//!     RawSample::new(3, 1.5, color),
//!     RawSample::new(4, 2.0, color),
//!     RawSample::new(4, 2.0, color),
//! ];
//!
//! // Two probes, two measurements each.
//! let compressed = compress(2, &raw, &cfg).unwrap();
//! assert_eq!(compressed.len(), 2);
//! assert_eq!(compressed[0].weight, 2);
//! assert_eq!(compressed[1].probe, 1);
//! ```

use std::time::Instant;

use tracing::{debug, warn};

mod config;
mod error;
mod geometry;
mod render;
mod types;

pub use crate::config::SampleConfig;
pub use crate::error::SampleError;
pub use crate::geometry::{rotate, CubeGeometry, ProbeGeometry, Rotation};
pub use crate::render::{ExclusionMask, Renderer};
pub use crate::types::{CompressedSample, LabColor, Probe, RawSample, Transform};

/// Validate a raw batch and fold repeated measurements per probe.
pub fn compress(
    probe_count: usize,
    raw: &[RawSample],
    cfg: &SampleConfig,
) -> Result<Vec<CompressedSample>, SampleError> {
    let start = Instant::now();
    match compress_inner(probe_count, raw, cfg) {
        Ok(samples) => {
            debug!(
                probes = probe_count,
                raw = raw.len(),
                compressed = samples.len(),
                elapsed_micros = start.elapsed().as_micros(),
                "compress_success"
            );
            Ok(samples)
        }
        Err(err) => {
            warn!(error = %err, probes = probe_count, raw = raw.len(), "compress_failure");
            Err(err)
        }
    }
}

fn compress_inner(
    probe_count: usize,
    raw: &[RawSample],
    cfg: &SampleConfig,
) -> Result<Vec<CompressedSample>, SampleError> {
    cfg.validate()?;
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    if probe_count == 0 {
        return Err(SampleError::NoProbes { samples: raw.len() });
    }
    if raw.len() % probe_count != 0 {
        return Err(SampleError::UnevenBatch {
            samples: raw.len(),
            probes: probe_count,
        });
    }
    validate_samples(raw, cfg)?;

    let per_probe = raw.len() / probe_count;
    let mut out = Vec::with_capacity(probe_count);
    for (probe, chunk) in raw.chunks(per_probe).enumerate() {
        let first = out.len();
        for sample in chunk {
            // Per-probe runs are short; a linear probe beats hashing floats.
            match out[first..]
                .iter_mut()
                .find(|c: &&mut CompressedSample| c.raw().same_measurement(sample))
            {
                Some(existing) => existing.weight += 1,
                None => out.push(CompressedSample::from_raw(*sample, 1, probe as u32)),
            }
        }
    }
    Ok(out)
}

/// Check every raw sample against the configured occlusion range.
pub fn validate_samples(raw: &[RawSample], cfg: &SampleConfig) -> Result<(), SampleError> {
    for (index, sample) in raw.iter().enumerate() {
        if sample.occlusion > cfg.samples_per_probe {
            return Err(SampleError::OcclusionOutOfRange {
                index,
                occlusion: sample.occlusion,
                max: cfg.samples_per_probe,
            });
        }
        if !sample.distance.is_finite() || sample.distance < 0.0 {
            return Err(SampleError::InvalidDistance {
                index,
                distance: sample.distance,
            });
        }
    }
    Ok(())
}

/// Check that every probe references a direction the geometry defines.
pub fn validate_probes(probes: &[Probe], geometry: &dyn ProbeGeometry) -> Result<(), SampleError> {
    let available = geometry.directions().len();
    for (index, probe) in probes.iter().enumerate() {
        if probe.direction as usize >= available {
            return Err(SampleError::UnknownDirection {
                index,
                direction: probe.direction,
                available,
            });
        }
    }
    Ok(())
}
