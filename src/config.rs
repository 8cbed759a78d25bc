//! TOML-based planner configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level planner configuration parsed from TOML.
///
/// All sections have defaults matching the reference deployment. Load from
/// TOML with [`PlannerConfig::from_toml_file`] or use
/// [`PlannerConfig::default`] for the built-in values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerConfig {
    /// Priority regressor hyperparameters and training split.
    #[serde(default)]
    pub model: ModelConfig,
    /// County clusterer parameters.
    #[serde(default)]
    pub clustering: ClusteringConfig,
    /// Feature construction constants.
    #[serde(default)]
    pub data: DataConfig,
    /// Result cache bounds.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Bucket thresholds for the recommendation generator.
    #[serde(default)]
    pub recommendations: RecommendationConfig,
    /// Background training limits.
    #[serde(default)]
    pub training: TrainingConfig,
    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Random forest hyperparameters and evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Number of trees in the forest (must be > 0).
    pub n_estimators: usize,
    /// Maximum tree depth (must be > 0).
    pub max_depth: usize,
    /// Minimum samples a node needs before it may split (must be >= 2).
    pub min_samples_split: usize,
    /// Seed for bootstrap sampling, the holdout split and k-means seeding.
    pub random_state: u64,
    /// Fraction of the batch held out for validation (0.0, 1.0).
    pub test_size: f64,
    /// Number of cross-validation folds (must be >= 2).
    pub cv_folds: usize,
    /// Semantic version stamped on every trained model.
    pub version: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 5,
            random_state: 42,
            test_size: 0.2,
            cv_folds: 5,
            version: "1.0.0".to_string(),
        }
    }
}

/// K-means parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusteringConfig {
    /// Number of county segments.
    pub n_clusters: usize,
    /// Independent k-means++ restarts; the lowest inertia wins.
    pub n_init: usize,
    /// Lloyd iteration cap per restart.
    pub max_iter: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            n_clusters: 3,
            n_init: 10,
            max_iter: 300,
        }
    }
}

/// Feature construction constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Baseline energy need per resident (kWh).
    pub energy_per_capita: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            energy_per_capita: 50.0,
        }
    }
}

/// Result cache bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Minutes a cached batch result stays valid.
    pub ttl_minutes: i64,
    /// Maximum number of cached batches.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 30,
            max_entries: 64,
        }
    }
}

impl CacheConfig {
    /// Entry lifetime, or `None` when `ttl_minutes` is not a positive
    /// duration chrono can represent.
    pub fn ttl(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_minutes(self.ttl_minutes).filter(|d| *d > chrono::Duration::zero())
    }
}

/// Bucket thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecommendationConfig {
    /// Grid distance (km) beyond which solar mini-grids are considered.
    pub solar_threshold_km: f64,
    /// Grid distance (km) at or below which grid extension is recommended.
    pub grid_extension_threshold_km: f64,
    /// Lower (exclusive) bound of the hybrid distance band (km).
    pub hybrid_min_km: f64,
    /// Upper (inclusive) bound of the hybrid distance band (km).
    pub hybrid_max_km: f64,
    /// Batch quantile of priority score marking immediate intervention.
    pub priority_percentile: f64,
    /// Length of the ranked county list in a report.
    pub top_counties_count: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            solar_threshold_km: 15.0,
            grid_extension_threshold_km: 10.0,
            hybrid_min_km: 10.0,
            hybrid_max_km: 20.0,
            priority_percentile: 0.8,
            top_counties_count: 10,
        }
    }
}

/// Background training limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Wall-clock budget for one background training run (seconds).
    pub timeout_secs: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"county_priority=debug"`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"model.n_estimators"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl PlannerConfig {
    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let m = &self.model;
        if m.n_estimators == 0 {
            errors.push(ConfigError::new("model.n_estimators", "must be > 0"));
        }
        if m.max_depth == 0 {
            errors.push(ConfigError::new("model.max_depth", "must be > 0"));
        }
        if m.min_samples_split < 2 {
            errors.push(ConfigError::new("model.min_samples_split", "must be >= 2"));
        }
        if !(m.test_size > 0.0 && m.test_size < 1.0) {
            errors.push(ConfigError::new("model.test_size", "must be in (0.0, 1.0)"));
        }
        if m.cv_folds < 2 {
            errors.push(ConfigError::new("model.cv_folds", "must be >= 2"));
        }
        if m.version.trim().is_empty() {
            errors.push(ConfigError::new("model.version", "must not be empty"));
        }

        let c = &self.clustering;
        if c.n_clusters == 0 {
            errors.push(ConfigError::new("clustering.n_clusters", "must be > 0"));
        }
        if c.n_init == 0 {
            errors.push(ConfigError::new("clustering.n_init", "must be > 0"));
        }
        if c.max_iter == 0 {
            errors.push(ConfigError::new("clustering.max_iter", "must be > 0"));
        }

        if !(self.data.energy_per_capita.is_finite() && self.data.energy_per_capita >= 0.0) {
            errors.push(ConfigError::new("data.energy_per_capita", "must be >= 0"));
        }

        if self.cache.ttl_minutes <= 0 {
            errors.push(ConfigError::new("cache.ttl_minutes", "must be > 0"));
        } else if self.cache.ttl().is_none() {
            errors.push(ConfigError::new("cache.ttl_minutes", "is out of range"));
        }
        if self.cache.max_entries == 0 {
            errors.push(ConfigError::new("cache.max_entries", "must be > 0"));
        }

        let r = &self.recommendations;
        let distances = [
            ("recommendations.solar_threshold_km", r.solar_threshold_km),
            ("recommendations.grid_extension_threshold_km", r.grid_extension_threshold_km),
            ("recommendations.hybrid_min_km", r.hybrid_min_km),
            ("recommendations.hybrid_max_km", r.hybrid_max_km),
        ];
        for (field, km) in distances {
            if !(km.is_finite() && km >= 0.0) {
                errors.push(ConfigError::new(field, "must be a finite distance >= 0"));
            }
        }
        if r.hybrid_min_km >= r.hybrid_max_km {
            errors.push(ConfigError::new(
                "recommendations.hybrid_min_km",
                "must be < recommendations.hybrid_max_km",
            ));
        }
        if !(0.0..=1.0).contains(&r.priority_percentile) {
            errors.push(ConfigError::new(
                "recommendations.priority_percentile",
                "must be in [0.0, 1.0]",
            ));
        }
        if r.top_counties_count == 0 {
            errors.push(ConfigError::new("recommendations.top_counties_count", "must be > 0"));
        }

        if self.training.timeout_secs == 0 {
            errors.push(ConfigError::new("training.timeout_secs", "must be > 0"));
        }

        errors
    }
}
