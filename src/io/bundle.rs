//! JSON model bundles for saving and restoring a trained generation.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PlannerConfig;
use crate::error::PersistenceError;
use crate::model::{KMeans, ModelState, RandomForest, StandardScaler};

/// Bundle layout version written by this crate.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// On-disk form of a [`ModelState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub regressor: RandomForest,
    pub scaler: StandardScaler,
    pub clusterer: KMeans,
    pub feature_columns: Vec<String>,
    pub config: PlannerConfig,
    pub model_version: String,
    pub last_trained: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}

impl ModelBundle {
    pub fn from_state(state: &ModelState) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            regressor: state.regressor.clone(),
            scaler: state.scaler.clone(),
            clusterer: state.clusterer.clone(),
            feature_columns: state.feature_columns.clone(),
            config: state.config.clone(),
            model_version: state.version.clone(),
            last_trained: state.last_trained,
            saved_at: Utc::now(),
        }
    }

    /// Checks the bundle's internal shape before it is trusted for inference.
    fn check(&self) -> Result<(), String> {
        if self.format_version != BUNDLE_FORMAT_VERSION {
            return Err(format!(
                "unsupported format_version {} (expected {BUNDLE_FORMAT_VERSION})",
                self.format_version
            ));
        }
        let n = self.feature_columns.len();
        if self.scaler.columns() != self.feature_columns.as_slice() || !self.scaler.is_consistent()
        {
            return Err("scaler does not match feature columns".into());
        }
        if self.regressor.n_features() != n || !self.regressor.is_consistent() {
            return Err("regressor does not match feature columns".into());
        }
        if !self.clusterer.is_consistent(n) {
            return Err("clusterer does not match feature columns".into());
        }
        Ok(())
    }

    /// Converts the bundle into a serving state stamped with `generation`.
    pub fn into_state(self, generation: u64) -> ModelState {
        ModelState {
            scaler: self.scaler,
            regressor: self.regressor,
            clusterer: self.clusterer,
            feature_columns: self.feature_columns,
            config: self.config,
            version: self.model_version,
            generation,
            last_trained: self.last_trained,
        }
    }
}

/// Serializes a bundle as JSON to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if serialization or writing fails.
pub fn write_bundle(bundle: &ModelBundle, mut writer: impl Write) -> io::Result<()> {
    serde_json::to_writer(&mut writer, bundle)?;
    writer.flush()
}

/// Reads and checks a bundle from any reader.
///
/// Returns the rejection reason on malformed or inconsistent input.
pub fn read_bundle(mut reader: impl Read) -> Result<ModelBundle, String> {
    let mut text = String::new();
    reader.read_to_string(&mut text).map_err(|e| e.to_string())?;
    let bundle: ModelBundle = serde_json::from_str(&text).map_err(|e| e.to_string())?;
    bundle.check()?;
    Ok(bundle)
}

/// Saves a trained state to `path`.
///
/// The bundle is written to a sibling temporary file and renamed into place,
/// so a reader never sees a half-written bundle.
///
/// # Errors
///
/// Returns [`PersistenceError::Write`] if the file cannot be written.
pub fn save_bundle(state: &ModelState, path: &Path) -> Result<(), PersistenceError> {
    let write_err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };
    let tmp = tmp_path(path);
    let written = File::create(&tmp)
        .and_then(|file| write_bundle(&ModelBundle::from_state(state), BufWriter::new(file)))
        .and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(e));
    }
    info!(
        path = %path.display(),
        version = state.version(),
        generation = state.generation(),
        "model bundle saved"
    );
    Ok(())
}

/// Loads a bundle from `path`.
///
/// # Errors
///
/// * [`PersistenceError::NotFound`] if nothing exists at `path`
/// * [`PersistenceError::Corrupt`] if it cannot be read, decoded or is inconsistent
pub fn load_bundle(path: &Path) -> Result<ModelBundle, PersistenceError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PersistenceError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(PersistenceError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };
    let bundle = read_bundle(io::BufReader::new(file)).map_err(|reason| {
        PersistenceError::Corrupt {
            path: path.to_path_buf(),
            reason,
        }
    })?;
    info!(
        path = %path.display(),
        version = %bundle.model_version,
        "model bundle loaded"
    );
    Ok(bundle)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
