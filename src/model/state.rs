//! Immutable trained model generation and its training procedure.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::forest::{ForestParams, RandomForest};
use super::kmeans::{KMeans, KMeansParams};
use super::metrics::{mean, population_std, r2_score, rmse};
use super::scaler::StandardScaler;
use crate::config::PlannerConfig;
use crate::county::{CountyRecord, ENERGY_DEFICIT_COL, FeatureMatrix};
use crate::error::{PlannerError, TrainingError};

/// K-means convergence tolerance.
const KMEANS_TOL: f64 = 1e-4;

/// Evaluation report of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub train_r2: f64,
    pub test_r2: f64,
    /// Mean R² over the cross-validation folds.
    pub cv_mean: f64,
    /// Population standard deviation of the fold R² scores.
    pub cv_std: f64,
    /// Number of folds actually used (0 when cross-validation was skipped).
    pub cv_folds: usize,
    /// `false` when the batch was too small for the fold scores to mean much.
    pub cv_meaningful: bool,
    /// Holdout root-mean-square error, in standardised deficit units.
    pub rmse: f64,
    /// Impurity importance per feature column.
    pub feature_importance: BTreeMap<String, f64>,
    pub training_samples: usize,
    pub test_samples: usize,
}

impl fmt::Display for TrainingMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Training Report ---")?;
        writeln!(f, "Train R²:        {:.3}", self.train_r2)?;
        writeln!(f, "Test R²:         {:.3}", self.test_r2)?;
        if self.cv_meaningful {
            writeln!(
                f,
                "CV R² ({} folds): {:.3} (±{:.3})",
                self.cv_folds, self.cv_mean, self.cv_std
            )?;
        } else {
            writeln!(f, "CV R²:           n/a (batch too small)")?;
        }
        writeln!(f, "Holdout RMSE:    {:.3}", self.rmse)?;
        writeln!(
            f,
            "Samples:         {} train / {} test",
            self.training_samples, self.test_samples
        )?;
        write!(f, "Importance:")?;
        for (col, w) in &self.feature_importance {
            write!(f, "\n  {col:<18} {w:.3}")?;
        }
        Ok(())
    }
}

/// Per-county model output before batch-relative bucketing.
#[derive(Debug, Clone, PartialEq)]
pub struct CountyScore {
    pub energy_deficit: f64,
    pub priority_score: f64,
    pub cluster_id: usize,
}

/// One generation of fitted scaler, regressor and clusterer.
///
/// Never mutated after construction; a retrain builds a new value and the
/// service swaps its pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub(crate) scaler: StandardScaler,
    pub(crate) regressor: RandomForest,
    pub(crate) clusterer: KMeans,
    pub(crate) feature_columns: Vec<String>,
    pub(crate) config: PlannerConfig,
    pub(crate) version: String,
    pub(crate) generation: u64,
    pub(crate) last_trained: DateTime<Utc>,
}

/// Holdout split: a seeded permutation, test rows first.
///
/// A single row is used for both sides.
fn train_test_split(n: usize, test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    if n < 2 {
        return ((0..n).collect(), (0..n).collect());
    }
    let n_test = ((n as f64 * test_size).ceil() as usize).clamp(1, n - 1);
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let test = order[..n_test].to_vec();
    let train = order[n_test..].to_vec();
    (train, test)
}

/// Contiguous, unshuffled folds; the first `n % k` folds get one extra row.
fn kfold(n: usize, k: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for f in 0..k {
        let size = n / k + usize::from(f < n % k);
        let test: Vec<usize> = (start..start + size).collect();
        let train: Vec<usize> = (0..start).chain(start + size..n).collect();
        folds.push((train, test));
        start += size;
    }
    folds
}

fn select<T: Clone>(data: &[T], idx: &[usize]) -> Vec<T> {
    idx.iter().map(|&i| data[i].clone()).collect()
}

impl ModelState {
    /// Trains a fresh model generation on a validated batch.
    ///
    /// The target is the standardised `energy_deficit` column. The forest is
    /// fit on the training split and evaluated on the holdout plus k-fold
    /// cross-validation; the clusterer is fit on the full scaled batch.
    ///
    /// # Errors
    ///
    /// * [`TrainingError::EmptyBatch`] for an empty batch
    /// * [`TrainingError::Cancelled`] if `cancel` is raised
    pub fn train(
        records: &[CountyRecord],
        config: &PlannerConfig,
        generation: u64,
        cancel: &AtomicBool,
    ) -> Result<(Self, TrainingMetrics), TrainingError> {
        if records.is_empty() {
            return Err(TrainingError::EmptyBatch);
        }
        let m = &config.model;
        let raw = FeatureMatrix::from_records(records, config.data.energy_per_capita);
        let (scaler, scaled) = StandardScaler::fit_transform(&raw);
        let x = &scaled.rows;
        let y = scaled.column(ENERGY_DEFICIT_COL);
        let n = x.len();

        let forest_params = ForestParams {
            n_estimators: m.n_estimators,
            max_depth: m.max_depth,
            min_samples_split: m.min_samples_split,
            seed: m.random_state,
        };

        let (train_idx, test_idx) = train_test_split(n, m.test_size, m.random_state);
        let (x_train, y_train) = (select(x, &train_idx), select(&y, &train_idx));
        let (x_test, y_test) = (select(x, &test_idx), select(&y, &test_idx));
        debug!(
            train = train_idx.len(),
            test = test_idx.len(),
            "holdout split"
        );

        let regressor = RandomForest::fit(&x_train, &y_train, forest_params, cancel)?;
        let train_r2 = r2_score(&y_train, &regressor.predict(&x_train));
        let test_pred = regressor.predict(&x_test);
        let test_r2 = r2_score(&y_test, &test_pred);
        let holdout_rmse = rmse(&y_test, &test_pred);

        // Each fold needs at least two rows for its R² to mean anything.
        let folds = m.cv_folds.min(n);
        let cv_meaningful = folds >= 2 && n >= 2 * folds;
        let (cv_mean, cv_std, cv_folds) = if cv_meaningful {
            let mut scores = Vec::with_capacity(folds);
            for (train, test) in kfold(n, folds) {
                let fold_model =
                    RandomForest::fit(&select(x, &train), &select(&y, &train), forest_params, cancel)?;
                let fold_true = select(&y, &test);
                scores.push(r2_score(&fold_true, &fold_model.predict(&select(x, &test))));
            }
            (mean(&scores), population_std(&scores), folds)
        } else {
            debug!(n, folds, "batch too small for cross-validation");
            (0.0, 0.0, 0)
        };

        let clusterer = KMeans::fit(
            x,
            KMeansParams {
                n_clusters: config.clustering.n_clusters,
                n_init: config.clustering.n_init,
                max_iter: config.clustering.max_iter,
                tol: KMEANS_TOL,
                seed: m.random_state,
            },
        )?;

        let feature_importance = scaled
            .columns
            .iter()
            .cloned()
            .zip(regressor.feature_importances().iter().copied())
            .collect();

        let metrics = TrainingMetrics {
            train_r2,
            test_r2,
            cv_mean,
            cv_std,
            cv_folds,
            cv_meaningful,
            rmse: holdout_rmse,
            feature_importance,
            training_samples: train_idx.len(),
            test_samples: test_idx.len(),
        };
        info!(
            counties = n,
            test_r2 = format_args!("{test_r2:.3}"),
            cv_mean = format_args!("{cv_mean:.3}"),
            cv_std = format_args!("{cv_std:.3}"),
            cv_meaningful,
            "model training completed"
        );

        let state = Self {
            scaler,
            regressor,
            clusterer,
            feature_columns: scaled.columns,
            config: config.clone(),
            version: m.version.clone(),
            generation,
            last_trained: Utc::now(),
        };
        Ok((state, metrics))
    }

    /// Scores a validated batch with this generation's scaler and models.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::ColumnMismatch`] if the feature layout differs
    /// from the one this model was trained on.
    pub fn score(&self, records: &[CountyRecord]) -> Result<Vec<CountyScore>, PlannerError> {
        let raw = FeatureMatrix::from_records(records, self.config.data.energy_per_capita);
        if raw.columns != self.feature_columns {
            return Err(PlannerError::ColumnMismatch {
                expected: self.feature_columns.clone(),
                actual: raw.columns,
            });
        }
        let scaled = self.scaler.transform(&raw)?;
        Ok(raw
            .rows
            .iter()
            .zip(&scaled.rows)
            .map(|(raw_row, row)| CountyScore {
                energy_deficit: raw_row[ENERGY_DEFICIT_COL],
                priority_score: self.regressor.predict_row(row),
                cluster_id: self.clusterer.predict_row(row),
            })
            .collect())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Monotonic counter of swaps performed by the owning service.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_trained(&self) -> DateTime<Utc> {
        self.last_trained
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// Configuration the model was trained with.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn n_clusters(&self) -> usize {
        self.clusterer.n_clusters()
    }

    /// Copy of this state re-stamped with a service generation.
    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }
}
