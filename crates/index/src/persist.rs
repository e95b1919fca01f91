//! Binary cache files: 4-byte magic, little-endian `u32` format version, then
//! a zstd-compressed bincode payload.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use sample::{CubeGeometry, Probe, ProbeGeometry, RawSample};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zstd::{decode_all, encode_all};

use crate::database::{DatabaseState, FingerprintDatabase};
use crate::{IndexConfig, IndexError};

/// Bump whenever any persisted layout changes. Mismatches are rejected.
pub const FORMAT_VERSION: u32 = 1;

pub const DATABASE_MAGIC: [u8; 4] = *b"PFDB";
pub const RECORDING_MAGIC: [u8; 4] = *b"PFQR";

const HEADER_LEN: usize = 8;

fn encode_file<T: Serialize>(magic: [u8; 4], value: &T, level: i32) -> Result<Vec<u8>, IndexError> {
    let payload = encode_to_vec(value, standard())?;
    let compressed = encode_all(payload.as_slice(), level).map_err(|e| IndexError::Zstd(e.to_string()))?;
    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(&magic);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

fn decode_file<T: DeserializeOwned>(magic: [u8; 4], bytes: &[u8]) -> Result<T, IndexError> {
    if bytes.len() < HEADER_LEN || bytes[..4] != magic {
        return Err(IndexError::BadMagic);
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..HEADER_LEN]);
    let found = u32::from_le_bytes(version);
    if found != FORMAT_VERSION {
        return Err(IndexError::VersionMismatch {
            found,
            expected: FORMAT_VERSION,
        });
    }
    let payload = decode_all(&bytes[HEADER_LEN..]).map_err(|e| IndexError::Zstd(e.to_string()))?;
    let (value, _) = decode_from_slice(&payload, standard())?;
    Ok(value)
}

impl FingerprintDatabase {
    /// Serialize the compiled state (queued instances included).
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        encode_file(DATABASE_MAGIC, &self.state, self.config().compression_level)
    }

    pub fn from_bytes(
        cfg: IndexConfig,
        geometry: Arc<dyn ProbeGeometry>,
        bytes: &[u8],
    ) -> Result<Self, IndexError> {
        let state: DatabaseState = decode_file(DATABASE_MAGIC, bytes)?;
        Self::from_state(cfg, geometry, state)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        let path = path.as_ref();
        let start = Instant::now();
        let bytes = self.to_bytes()?;
        fs::write(path, &bytes)?;
        info!(
            path = %path.display(),
            bytes = bytes.len(),
            models = self.models().len(),
            elapsed_micros = start.elapsed().as_micros(),
            "database_saved"
        );
        Ok(())
    }

    /// Load a cache written by [`Self::save`] over the cube geometry.
    pub fn load(cfg: IndexConfig, path: impl AsRef<Path>) -> Result<Self, IndexError> {
        Self::load_with_geometry(cfg, Arc::new(CubeGeometry::new()), path)
    }

    pub fn load_with_geometry(
        cfg: IndexConfig,
        geometry: Arc<dyn ProbeGeometry>,
        path: impl AsRef<Path>,
    ) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let start = Instant::now();
        let result = fs::read(path)
            .map_err(IndexError::from)
            .and_then(|bytes| Self::from_bytes(cfg, geometry, &bytes));
        match &result {
            Ok(db) => info!(
                path = %path.display(),
                models = db.models().len(),
                elapsed_micros = start.elapsed().as_micros(),
                "database_loaded"
            ),
            Err(err) => warn!(path = %path.display(), error = %err, "database_load_failure"),
        }
        result
    }

    /// Load the cache, falling back to an empty database when it is missing
    /// or unreadable. Only an invalid `cfg` is returned as an error.
    pub fn load_or_empty(cfg: IndexConfig, path: impl AsRef<Path>) -> Result<Self, IndexError> {
        match Self::load(cfg.clone(), path) {
            Ok(db) => Ok(db),
            Err(_) => Self::new(cfg),
        }
    }
}

/// Raw query probes and measurements kept for offline replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecording {
    pub samples_per_probe: u16,
    /// Resolution the query volume was sampled at. Informational: matching
    /// snaps query probes to each candidate model's own resolution.
    pub resolution: f32,
    pub probes: Vec<Probe>,
    pub raw_samples: Vec<RawSample>,
}

impl QueryRecording {
    pub fn new(
        samples_per_probe: u16,
        resolution: f32,
        probes: Vec<Probe>,
        raw_samples: Vec<RawSample>,
    ) -> Self {
        Self {
            samples_per_probe,
            resolution,
            probes,
            raw_samples,
        }
    }

    pub fn to_bytes(&self, level: i32) -> Result<Vec<u8>, IndexError> {
        encode_file(RECORDING_MAGIC, self, level)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        decode_file(RECORDING_MAGIC, bytes)
    }

    pub fn save(&self, path: impl AsRef<Path>, level: i32) -> Result<(), IndexError> {
        fs::write(path, self.to_bytes(level)?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let result = fs::read(path)
            .map_err(IndexError::from)
            .and_then(|bytes| Self::from_bytes(&bytes));
        if let Err(err) = &result {
            warn!(path = %path.display(), error = %err, "recording_load_failure");
        }
        result
    }
}
