use std::time::Instant;

use index::{
    BucketedIndex, ColorStats, FingerprintDatabase, LocalId, QueryRecording, SampledModel,
    SortedIndex,
};
use rayon::prelude::*;
use sample::{compress, validate_probes, Probe, RawSample, SampleError};
use tracing::{debug, info, warn};

use crate::metrics::metrics_recorder;
use crate::strategy::{configuration, coverage, BucketWeights, Strategy, Weighting};
use crate::types::{DetailedResult, MatchConfig, MatchError, MatchResult};


/// One query against a frozen [`FingerprintDatabase`].
///
/// Build it with [`Query::new`], call [`Query::execute`] exactly once and read
/// [`Query::results`] or [`Query::detailed_results`]. Results are unordered;
/// apply [`rank_results`] for score order.
///
/// The database must not be recompiled while a query borrows it. Models with
/// queued but uncompiled instances are matched as last compiled.
///
/// # Performance
///
/// The tolerance scan crosses every db/query pair inside a bucket window, so
/// wide tolerances over large uniform regions are quadratic in the bucket
/// size. Full kinds also allocate a vote grid per candidate spanning the
/// query's bounding box in cells of that model's resolution; a finely sampled
/// model against a large query volume can need a very large grid. Candidates
/// whose grid would exceed [`MAX_VOTE_CELLS`](crate::MAX_VOTE_CELLS) fail with
/// [`MatchError::VoteGridTooLarge`] and are dropped from the results.
pub struct Query<'db> {
    db: &'db FingerprintDatabase,
    config: MatchConfig,
    probes: Vec<Probe>,
    index: BucketedIndex,
    direction_indices: Vec<BucketedIndex>,
    stats: ColorStats,
    results: Vec<DetailedResult>,
    executed: bool,
}

impl<'db> Query<'db> {
    /// Compress and index a measured query volume.
    pub fn new(
        db: &'db FingerprintDatabase,
        config: MatchConfig,
        probes: Vec<Probe>,
        raw: &[RawSample],
    ) -> Result<Self, MatchError> {
        config.validate()?;
        validate_probes(&probes, db.geometry())?;
        let sample_cfg = &db.config().sample;
        let samples = compress(probes.len(), raw, sample_cfg)?;
        let index = BucketedIndex::new(
            SortedIndex::from_samples(samples),
            sample_cfg.samples_per_probe,
        );
        let stats = ColorStats::from_samples(db.config().color_bins, index.as_slice());
        let direction_indices = match config.kind.strategy() {
            Strategy::Coverage => Vec::new(),
            Strategy::Configuration => (0..db.geometry().directions().len())
                .map(|d| index.filter(|s| probes[s.probe as usize].direction as usize == d))
                .collect(),
        };
        Ok(Self {
            db,
            config,
            probes,
            index,
            direction_indices,
            stats,
            results: Vec::new(),
            executed: false,
        })
    }

    /// Query from a replay recording; its ray count must match the database
    /// and its recorded resolution must be a positive finite number.
    pub fn from_recording(
        db: &'db FingerprintDatabase,
        config: MatchConfig,
        recording: &QueryRecording,
    ) -> Result<Self, MatchError> {
        let resolution = recording.resolution;
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(SampleError::InvalidResolution(resolution).into());
        }
        if recording.samples_per_probe != db.samples_per_probe() {
            return Err(MatchError::LevelMismatch {
                query: recording.samples_per_probe,
                database: db.samples_per_probe(),
            });
        }
        Self::new(db, config, recording.probes.clone(), &recording.raw_samples)
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// The compressed, sorted query samples.
    pub fn index(&self) -> &BucketedIndex {
        &self.index
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Match every compiled model. Fails with [`MatchError::AlreadyExecuted`]
    /// on a second call.
    pub fn execute(&mut self) -> Result<(), MatchError> {
        if self.executed {
            return Err(MatchError::AlreadyExecuted);
        }
        let span = tracing::info_span!("query_execute", kind = %self.config.kind);
        let _guard = span.enter();
        let start = Instant::now();

        let stale = self
            .db
            .models()
            .iter()
            .filter(|m| m.pending_count() > 0)
            .count();
        if stale > 0 {
            debug!(stale, "models_with_uncompiled_instances");
        }

        let results = match self.config.threads {
            None => self.match_all(),
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| MatchError::ThreadPool(e.to_string()))?
                .install(|| self.match_all()),
        };
        self.results = results;
        self.executed = true;

        let latency = start.elapsed();
        info!(
            candidates = self.db.models().len(),
            results = self.results.len(),
            query_samples = self.index.len(),
            elapsed_micros = latency.as_micros(),
            "query_success"
        );
        if let Some(recorder) = metrics_recorder() {
            recorder.record_query(
                self.config.kind,
                latency,
                self.db.models().len(),
                self.results.len(),
            );
        }
        Ok(())
    }

    fn match_all(&self) -> Vec<DetailedResult> {
        let weighting = self.config.kind.weighting();
        let reference = self.reference();
        let query_weights = BucketWeights::new(weighting, &self.stats, reference);
        let query_total = query_weights.total();
        self.db
            .models()
            .par_iter()
            .enumerate()
            .filter_map(|(local, model)| {
                let local = local as LocalId;
                match self.match_model(local, model, &query_weights, query_total) {
                    Ok(result) => result,
                    Err(err) => {
                        warn!(local, error = %err, "model_match_failure");
                        None
                    }
                }
            })
            .collect()
    }

    fn reference(&self) -> Option<&ColorStats> {
        self.config.blend_global.then(|| self.db.global_stats())
    }

    /// Score one candidate; `None` when it has nothing in common with the query.
    fn match_model(
        &self,
        local: LocalId,
        model: &SampledModel,
        query_weights: &BucketWeights<'_>,
        query_total: f64,
    ) -> Result<Option<DetailedResult>, MatchError> {
        if model.is_empty() || self.index.is_empty() {
            return Ok(None);
        }
        let Some(model_id) = self.db.scene_id(local) else {
            return Ok(None);
        };
        let weighting = self.config.kind.weighting();
        let db_weights = BucketWeights::new(weighting, model.stats(), self.reference());
        let db_total = match weighting {
            Weighting::MessageLength if self.config.blend_global => model.message_length(),
            _ => db_weights.total(),
        };

        let cover = coverage(
            model.index(),
            &self.index,
            &self.config.tolerance,
            &db_weights,
            db_total,
            query_weights,
            query_total,
        )?;

        let mut result = DetailedResult {
            model_id,
            local_id: local,
            score: 0.0,
            num_matches: cover.num_matches,
            probe_match_percentage: cover.probe_fraction,
            query_match_percentage: cover.query_fraction,
            placement: None,
            orientation_scores: Vec::new(),
        };

        match self.config.kind.strategy() {
            Strategy::Coverage => {
                if cover.num_matches == 0 {
                    return Ok(None);
                }
                result.score = cover.score() as f32;
            }
            Strategy::Configuration => {
                let Some(resolution) = model.resolution() else {
                    return Ok(None);
                };
                let query_grid: Vec<[i32; 3]> = self
                    .probes
                    .iter()
                    .map(|p| p.grid_position(resolution))
                    .collect();
                let config = configuration(
                    model,
                    self.db.geometry(),
                    &self.direction_indices,
                    &query_grid,
                    &self.config.tolerance,
                    &db_weights,
                    db_total,
                    resolution,
                )?;
                if config.score <= 0.0 {
                    return Ok(None);
                }
                result.score = config.score as f32;
                result.placement = config.placement;
                result.orientation_scores = config.orientation_scores;
            }
        }
        Ok(Some(result))
    }

    /// Hits of the last [`Self::execute`], in no particular order.
    pub fn results(&self) -> Vec<MatchResult> {
        self.results.iter().map(DetailedResult::summary).collect()
    }

    pub fn detailed_results(&self) -> &[DetailedResult] {
        &self.results
    }

    pub fn into_detailed_results(self) -> Vec<DetailedResult> {
        self.results
    }
}

/// Anything [`rank_results`] can order.
pub trait Ranked {
    fn score(&self) -> f32;
    fn model_id(&self) -> u32;
}

impl Ranked for MatchResult {
    fn score(&self) -> f32 {
        self.score
    }

    fn model_id(&self) -> u32 {
        self.model_id
    }
}

impl Ranked for DetailedResult {
    fn score(&self) -> f32 {
        self.score
    }

    fn model_id(&self) -> u32 {
        self.model_id
    }
}

/// Sort by descending score, ties by ascending model id.
pub fn rank_results<T: Ranked>(results: &mut [T]) {
    results.sort_by(|a, b| {
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.model_id().cmp(&b.model_id()))
    });
}
