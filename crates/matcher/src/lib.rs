//! # probefp Matcher (`matcher`)
//!
//! ## Purpose
//!
//! `matcher` answers "which sampled models look like this query volume?".
//! A [`Query`] compresses the query's probe measurements into the same sorted,
//! occlusion-bucketed layout the [`index`] crate stores per model, then scores
//! every compiled model in parallel.
//!
//! ## Core Types
//!
//! - [`QueryKind`]: selects one of four variants:
//!   - `Plain`: mutual bag-of-samples coverage, each sample counting once.
//!   - `Importance`: the same coverage with rare colors weighing more.
//!   - `Full`: also searches 24 orientations and votes on the model's offset,
//!     yielding a [`Placement`].
//!   - `ImportanceFull`: `Full` with message-length weighted votes.
//! - [`Tolerance`]: inclusive occlusion, distance and color windows.
//! - [`MatchConfig`]: kind, tolerance and the worker thread bound.
//! - [`MatchResult`] / [`DetailedResult`]: per-model hits.
//! - [`scan`] with an [`Accumulator`]: the overlap scan every variant shares.
//!
//! ## Example Usage
//!
//! ```
//! use index::{FingerprintDatabase, IndexConfig};
//! use matcher::{rank_results, MatchConfig, Query, QueryKind, Tolerance};
//! use sample::{LabColor, Probe, RawSample, SampleConfig, Transform};
//!
//! let cfg = IndexConfig::default()
//!     .with_sample(SampleConfig::default().with_samples_per_probe(4));
//! let mut db = FingerprintDatabase::new(cfg).unwrap();
//!
//! let probes: Vec<Probe> = (0..8).map(|i| Probe::new([i as f32, 0.0, 0.0], 0)).collect();
//! let raw: Vec<RawSample> = (0..8)
//!     .map(|i| RawSample::new(i % 4, i as f32, LabColor::new(30, 0, 0)))
//!     .collect();
//! db.add_instance_probes(7, Transform::identity(), 1.0, &probes, &raw).unwrap();
//! db.compile_all().unwrap();
//!
//! let config = MatchConfig::new(QueryKind::Plain).with_tolerance(Tolerance::exact());
//! let mut query = Query::new(&db, config, probes, &raw).unwrap();
//! query.execute().unwrap();
//!
//! let mut hits = query.results();
//! rank_results(&mut hits);
//! assert_eq!(hits[0].model_id, 7);
//! assert_eq!(hits[0].score, 1.0);
//! ```
//!
//! ## Observability
//!
//! Install a [`MatchMetrics`] implementation via [`set_match_metrics`] to record
//! per-query latency, candidate and hit counts.

pub mod engine;
pub mod metrics;
pub mod scan;
pub mod strategy;
pub mod types;

pub use crate::engine::{rank_results, Query, Ranked};
pub use crate::metrics::{set_match_metrics, MatchMetrics};
pub use crate::scan::{scan, Accumulator};
pub use crate::strategy::{Strategy, Weighting, MAX_VOTE_CELLS};
pub use crate::types::{
    DetailedResult, MatchConfig, MatchError, MatchResult, Placement, QueryKind, Tolerance,
};
