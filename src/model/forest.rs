//! Bagged ensemble of regression trees.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use crate::error::TrainingError;

/// Forest hyperparameters.
#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Base seed; tree `i` bootstraps with `seed + i`.
    pub seed: u64,
}

/// Random forest regressor.
///
/// Every tree is grown on a bootstrap resample of the training rows and
/// considers all features at each split. Predictions average the trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fits the forest on `x`/`y`.
    ///
    /// `cancel` is polled before each tree so that a timed-out run stops early.
    ///
    /// # Errors
    ///
    /// * [`TrainingError::EmptyBatch`] if `x` has no rows
    /// * [`TrainingError::Cancelled`] if `cancel` is raised mid-fit
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        params: ForestParams,
        cancel: &AtomicBool,
    ) -> Result<Self, TrainingError> {
        let n = x.len();
        if n == 0 || y.len() != n {
            return Err(TrainingError::EmptyBatch);
        }
        let n_features = x[0].len();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
        };

        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importances = vec![0.0; n_features];

        for i in 0..params.n_estimators {
            if cancel.load(Ordering::Relaxed) {
                return Err(TrainingError::Cancelled);
            }
            let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(i as u64));
            let samples: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
            let (tree, gains) = RegressionTree::fit(x, y, samples, n_features, tree_params);

            let total: f64 = gains.iter().sum();
            if total > 0.0 {
                for (acc, g) in importances.iter_mut().zip(&gains) {
                    *acc += g / total;
                }
            }
            trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        Ok(Self {
            trees,
            n_features,
            feature_importances: importances,
        })
    }

    /// Mean of the tree predictions for one row.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        sum / self.trees.len() as f64
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }

    /// Normalised impurity importances (sum to 1 unless no split was ever made).
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub(crate) fn is_consistent(&self) -> bool {
        !self.trees.is_empty()
            && self.feature_importances.len() == self.n_features
            && self.trees.iter().all(|t| t.is_consistent(self.n_features))
    }
}
