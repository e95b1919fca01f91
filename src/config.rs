//! YAML configuration file support for probefp
//!
//! One file configures sampling, the database cache, query execution and
//! logging. Every section is optional and falls back to its defaults.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "shelf scan"
//!
//! sample:
//!   samples_per_probe: 16
//!
//! index:
//!   color_bins: 8
//!   compression_level: 3
//!   cache_path: "models.pfdb"
//!
//! matcher:
//!   kind: "importance_full"
//!   threads: 4
//!   max_results: 5
//!   tolerance:
//!     occlusion: 1
//!     distance: 0.05
//!     color: 6.0
//!
//! logging:
//!   level: "info"
//!   json: false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use index::IndexConfig;
use matcher::{MatchConfig, QueryKind, Tolerance};
use sample::SampleConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ProbeFpConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub sample: SampleYamlConfig,

    #[serde(default)]
    pub index: IndexYamlConfig,

    #[serde(default)]
    pub matcher: MatchYamlConfig,

    #[serde(default)]
    pub logging: LoggingYamlConfig,
}

impl ProbeFpConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: ProbeFpConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.index_config()
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("index: {e}")))?;
        self.match_config()
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("matcher: {e}")))?;
        self.logging.validate()?;
        Ok(())
    }

    /// Runtime index configuration built from the `sample` and `index` sections.
    pub fn index_config(&self) -> IndexConfig {
        IndexConfig::new()
            .with_sample(SampleConfig::new().with_samples_per_probe(self.sample.samples_per_probe))
            .with_color_bins(self.index.color_bins)
            .with_compression_level(self.index.compression_level)
    }

    /// Runtime query configuration built from the `matcher` section.
    pub fn match_config(&self) -> MatchConfig {
        let m = &self.matcher;
        let mut cfg = MatchConfig::new(m.kind)
            .with_tolerance(m.tolerance)
            .with_blend_global(m.blend_global)
            .with_max_results(m.max_results);
        cfg.threads = m.threads;
        cfg
    }
}

impl Default for ProbeFpConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            sample: SampleYamlConfig::default(),
            index: IndexYamlConfig::default(),
            matcher: MatchYamlConfig::default(),
            logging: LoggingYamlConfig::default(),
        }
    }
}

/// Sampling YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleYamlConfig {
    #[serde(default = "default_samples_per_probe")]
    pub samples_per_probe: u16,
}

impl Default for SampleYamlConfig {
    fn default() -> Self {
        Self {
            samples_per_probe: default_samples_per_probe(),
        }
    }
}

/// Index YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexYamlConfig {
    #[serde(default = "default_color_bins")]
    pub color_bins: u8,

    #[serde(default = "default_compression_level")]
    pub compression_level: i32,

    /// Database cache file; without one the binary starts empty.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

impl Default for IndexYamlConfig {
    fn default() -> Self {
        Self {
            color_bins: default_color_bins(),
            compression_level: default_compression_level(),
            cache_path: None,
        }
    }
}

/// Matcher YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchYamlConfig {
    #[serde(default)]
    pub kind: QueryKind,

    #[serde(default)]
    pub tolerance: Tolerance,

    #[serde(default)]
    pub threads: Option<usize>,

    #[serde(default = "true_value")]
    pub blend_global: bool,

    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for MatchYamlConfig {
    fn default() -> Self {
        Self {
            kind: QueryKind::default(),
            tolerance: Tolerance::default(),
            threads: None,
            blend_global: true,
            max_results: default_max_results(),
        }
    }
}

/// Logging YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingYamlConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl LoggingYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.level.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingYamlConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Helper functions for serde defaults
fn default_samples_per_probe() -> u16 {
    16
}
fn default_color_bins() -> u8 {
    index::DEFAULT_COLOR_BINS
}
fn default_compression_level() -> i32 {
    3
}
fn true_value() -> bool {
    true
}
fn default_max_results() -> usize {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
