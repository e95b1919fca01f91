//! Workspace umbrella crate for probe fingerprinting (probefp).
//!
//! Re-exports the sampling, index and matcher layers and adds the YAML
//! configuration loader plus [`replay`], the one-call path from a stored query
//! recording to ranked hits.

pub mod config;

pub use index::{
    BucketedIndex, ColorStats, FingerprintDatabase, IdMap, IndexConfig, IndexError, LocalId,
    QueryRecording, SampledModel, SceneId, SortedIndex, FORMAT_VERSION,
};
pub use matcher::{
    rank_results, set_match_metrics, DetailedResult, MatchConfig, MatchError, MatchMetrics,
    MatchResult, Placement, Query, QueryKind, Tolerance,
};
pub use sample::{
    compress, CompressedSample, CubeGeometry, ExclusionMask, LabColor, Probe, ProbeGeometry,
    RawSample, Renderer, SampleConfig, SampleError, Transform,
};

pub use crate::config::{ConfigLoadError, ProbeFpConfig};

use std::time::Instant;

use tracing::info;

/// Execute a recorded query and return its hits ranked best first, truncated
/// to `config.max_results`.
pub fn replay(
    db: &FingerprintDatabase,
    config: MatchConfig,
    recording: &QueryRecording,
) -> Result<Vec<DetailedResult>, MatchError> {
    let start = Instant::now();
    let max_results = config.max_results;
    let kind = config.kind;
    let mut query = Query::from_recording(db, config, recording)?;
    query.execute()?;
    let mut results = query.into_detailed_results();
    rank_results(&mut results);
    results.truncate(max_results);
    info!(
        kind = %kind,
        probes = recording.probes.len(),
        resolution = recording.resolution,
        results = results.len(),
        elapsed_micros = start.elapsed().as_micros(),
        "replay_success"
    );
    Ok(results)
}
