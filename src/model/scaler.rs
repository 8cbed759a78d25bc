//! Per-column standardisation.

use serde::{Deserialize, Serialize};

use crate::county::FeatureMatrix;
use crate::error::PlannerError;

/// Standardiser storing per-column mean and scale.
///
/// Uses the population standard deviation. A column with zero variance keeps
/// a scale of `1.0` so that transforming it yields zeros rather than NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fits statistics on `matrix` and returns the scaled copy.
    pub fn fit_transform(matrix: &FeatureMatrix) -> (Self, FeatureMatrix) {
        let n_cols = matrix.columns.len();
        let n = matrix.n_rows().max(1) as f64;

        let mut mean = vec![0.0; n_cols];
        for row in &matrix.rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; n_cols];
        for row in &matrix.rows {
            for ((s, v), m) in var.iter_mut().zip(row).zip(&mean) {
                *s += (v - m).powi(2);
            }
        }
        let scale = var
            .iter()
            .map(|s| {
                let std = (s / n).sqrt();
                if std > f64::EPSILON * 10.0 { std } else { 1.0 }
            })
            .collect();

        let scaler = Self {
            columns: matrix.columns.clone(),
            mean,
            scale,
        };
        let scaled = scaler.apply(matrix);
        (scaler, scaled)
    }

    /// Scales `matrix` with the stored statistics.
    ///
    /// # Errors
    ///
    /// * [`PlannerError::UntrainedModel`] if the scaler was never fitted
    /// * [`PlannerError::ColumnMismatch`] if `matrix` does not carry exactly the
    ///   fitted columns in the fitted order
    pub fn transform(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix, PlannerError> {
        if !self.is_fitted() {
            return Err(PlannerError::UntrainedModel);
        }
        if matrix.columns != self.columns {
            return Err(PlannerError::ColumnMismatch {
                expected: self.columns.clone(),
                actual: matrix.columns.clone(),
            });
        }
        Ok(self.apply(matrix))
    }

    pub fn is_fitted(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Structural self-check used when loading persisted bundles.
    pub(crate) fn is_consistent(&self) -> bool {
        self.is_fitted()
            && self.mean.len() == self.columns.len()
            && self.scale.len() == self.columns.len()
            && self.scale.iter().all(|s| s.is_finite() && *s > 0.0)
            && self.mean.iter().all(|m| m.is_finite())
    }

    fn apply(&self, matrix: &FeatureMatrix) -> FeatureMatrix {
        let rows = matrix
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.mean)
                    .zip(&self.scale)
                    .map(|((v, m), s)| (v - m) / s)
                    .collect()
            })
            .collect();
        FeatureMatrix {
            columns: matrix.columns.clone(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(columns: &[&str], rows: Vec<Vec<f64>>) -> FeatureMatrix {
        FeatureMatrix {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows,
        }
    }

    #[test]
    fn fit_transform_standardises_columns() {
        let m = matrix(&["a", "b"], vec![vec![1.0, 10.0], vec![3.0, 10.0]]);
        let (scaler, scaled) = StandardScaler::fit_transform(&m);
        assert!(scaler.is_fitted());
        // a: mean 2, std 1 -> [-1, 1]; b: zero variance -> zeros
        assert_eq!(scaled.rows[0], vec![-1.0, 0.0]);
        assert_eq!(scaled.rows[1], vec![1.0, 0.0]);
    }

    #[test]
    fn transform_reuses_fitted_statistics() {
        let m = matrix(&["a"], vec![vec![0.0], vec![4.0]]);
        let (scaler, _) = StandardScaler::fit_transform(&m);
        let out = scaler
            .transform(&matrix(&["a"], vec![vec![6.0]]))
            .expect("columns match");
        // mean 2, std 2
        assert_eq!(out.rows[0], vec![2.0]);
    }

    #[test]
    fn transform_before_fit_is_untrained() {
        let scaler = StandardScaler::default();
        let err = scaler.transform(&matrix(&["a"], vec![vec![1.0]])).unwrap_err();
        assert!(matches!(err, PlannerError::UntrainedModel));
    }

    #[test]
    fn transform_rejects_reordered_columns() {
        let (scaler, _) =
            StandardScaler::fit_transform(&matrix(&["a", "b"], vec![vec![1.0, 2.0]]));
        let err = scaler
            .transform(&matrix(&["b", "a"], vec![vec![2.0, 1.0]]))
            .unwrap_err();
        assert!(matches!(err, PlannerError::ColumnMismatch { .. }));
    }
}
