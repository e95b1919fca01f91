use index::{IndexError, LocalId, SceneId};
use sample::{Rotation, SampleError, Transform};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which of the four query variants to run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Bag-of-samples coverage, raw sample counts.
    #[default]
    Plain,
    /// Bag-of-samples coverage, message-length weighted.
    Importance,
    /// Orientation search with offset voting, raw sample counts.
    Full,
    /// Orientation search with message-length weighted votes.
    ImportanceFull,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::Plain => "plain",
            QueryKind::Importance => "importance",
            QueryKind::Full => "full",
            QueryKind::ImportanceFull => "importance_full",
        }
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-axis match windows. Every predicate is inclusive, so all-zero means
/// exact equality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Tolerance {
    /// Query samples within `[L - occlusion, L + occlusion]` are compared
    /// against database level `L`.
    #[serde(default)]
    pub occlusion: u16,
    /// Maximum absolute hit-distance difference.
    #[serde(default)]
    pub distance: f32,
    /// Maximum Euclidean Lab distance.
    #[serde(default)]
    pub color: f32,
}

impl Tolerance {
    pub fn new(occlusion: u16, distance: f32, color: f32) -> Self {
        Self {
            occlusion,
            distance,
            color,
        }
    }

    pub fn exact() -> Self {
        Self::default()
    }

    pub fn with_occlusion(mut self, occlusion: u16) -> Self {
        self.occlusion = occlusion;
        self
    }

    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_color(mut self, color: f32) -> Self {
        self.color = color;
        self
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if !(self.distance.is_finite() && self.distance >= 0.0) {
            return Err(MatchError::InvalidConfig(format!(
                "tolerance.distance must be finite and >= 0, got {}",
                self.distance
            )));
        }
        if !(self.color.is_finite() && self.color >= 0.0) {
            return Err(MatchError::InvalidConfig(format!(
                "tolerance.color must be finite and >= 0, got {}",
                self.color
            )));
        }
        Ok(())
    }
}

/// Configuration for a single query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchConfig {
    /// Configuration schema version.
    pub version: String,
    #[serde(default)]
    pub kind: QueryKind,
    #[serde(default)]
    pub tolerance: Tolerance,
    /// Worker threads for the per-model fan-out; `None` uses rayon's global pool.
    #[serde(default)]
    pub threads: Option<usize>,
    /// Blend message lengths with the database-global color histogram.
    /// Only consulted by the importance kinds.
    #[serde(default = "MatchConfig::default_blend_global")]
    pub blend_global: bool,
    /// How many ranked results callers should keep.
    #[serde(default = "MatchConfig::default_max_results")]
    pub max_results: usize,
}

impl MatchConfig {
    pub(crate) fn default_blend_global() -> bool {
        true
    }

    pub(crate) fn default_max_results() -> usize {
        10
    }

    pub fn new(kind: QueryKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: QueryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_blend_global(mut self, blend: bool) -> Self {
        self.blend_global = blend;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.version.trim().is_empty() {
            return Err(MatchError::InvalidConfig(
                "config.version must not be empty".into(),
            ));
        }
        if self.threads == Some(0) {
            return Err(MatchError::InvalidConfig(
                "threads must be greater than zero when set".into(),
            ));
        }
        if self.max_results == 0 {
            return Err(MatchError::InvalidConfig(
                "max_results must be greater than zero".into(),
            ));
        }
        self.tolerance.validate()
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            kind: QueryKind::default(),
            tolerance: Tolerance::default(),
            threads: None,
            blend_global: Self::default_blend_global(),
            max_results: Self::default_max_results(),
        }
    }
}

/// Best rigid pose of a model inside the query volume.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Placement {
    pub orientation: usize,
    pub rotation: Rotation,
    /// Maps model-local positions into the query frame after `rotation`.
    pub translation: [f32; 3],
}

impl Placement {
    pub fn to_transform(&self) -> Transform {
        let mut rotation = [[0.0f32; 3]; 3];
        for (row, values) in rotation.iter_mut().enumerate() {
            for (col, value) in values.iter_mut().enumerate() {
                *value = self.rotation[row][col] as f32;
            }
        }
        Transform {
            rotation,
            translation: self.translation,
        }
    }
}

/// A single hit returned by a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    pub model_id: SceneId,
    /// In `[0, 1]`.
    pub score: f32,
    /// Uncompressed database samples that matched at least one query sample.
    pub num_matches: u64,
    /// Present for the orientation-searching kinds.
    pub placement: Option<Placement>,
}

/// [`MatchResult`] plus the coverage fractions and per-orientation scores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailedResult {
    pub model_id: SceneId,
    pub local_id: LocalId,
    pub score: f32,
    pub num_matches: u64,
    /// Matched fraction of the model's samples (weighted per the query kind).
    pub probe_match_percentage: f64,
    /// Matched fraction of the query's samples (weighted per the query kind).
    pub query_match_percentage: f64,
    pub placement: Option<Placement>,
    /// Best normalized vote of each orientation; empty for coverage kinds.
    pub orientation_scores: Vec<f32>,
}

impl DetailedResult {
    pub fn summary(&self) -> MatchResult {
        MatchResult {
            model_id: self.model_id,
            score: self.score,
            num_matches: self.num_matches,
            placement: self.placement,
        }
    }
}

/// Errors produced by the matching layer.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("invalid match config: {0}")]
    InvalidConfig(String),
    /// `execute` may only run once per query.
    #[error("query already executed")]
    AlreadyExecuted,
    #[error("query sampled with {query} rays per probe, database with {database}")]
    LevelMismatch { query: u16, database: u16 },
    #[error("thread pool error: {0}")]
    ThreadPool(String),
    #[error("vote grid of {cells} cells exceeds the {limit} cell limit")]
    VoteGridTooLarge { cells: usize, limit: usize },
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("sample error: {0}")]
    Sample(#[from] SampleError),
}
