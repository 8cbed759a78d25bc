//! Error taxonomy for the planner pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Every violation found in a rejected county batch.
///
/// The batch is rejected as a whole; `violations` enumerates all problems so
/// the caller can fix them in one pass.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("county batch rejected: {}", violations.join("; "))]
pub struct ValidationError {
    /// Human-readable violation descriptions, in record order.
    pub violations: Vec<String>,
}

/// Failures of a training run. The serving model is never touched.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("a training run is already in progress")]
    InProgress,

    #[error("training batch is empty")]
    EmptyBatch,

    #[error("training cancelled")]
    Cancelled,

    #[error("training exceeded its {secs}s budget")]
    TimedOut { secs: u64 },

    #[error("training task failed: {0}")]
    Join(String),
}

/// Failures loading or saving a model bundle.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("model bundle not found at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("model bundle at {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("cannot write model bundle to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error returned by [`crate::planner::PlannerService`].
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no trained model is available; use the rule engine instead")]
    UntrainedModel,

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("feature columns {actual:?} do not match fitted columns {expected:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
