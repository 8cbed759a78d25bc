//! K-means clustering with k-means++ seeding.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::TrainingError;

/// K-means fitting parameters.
#[derive(Debug, Clone, Copy)]
pub struct KMeansParams {
    pub n_clusters: usize,
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence tolerance relative to the mean per-feature variance.
    pub tol: f64,
    pub seed: u64,
}

/// Fitted centroids.
///
/// `n_clusters` is the configured segment count; `centroids` may hold fewer
/// when the training batch had fewer rows than clusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    n_clusters: usize,
    centroids: Vec<Vec<f64>>,
    inertia: f64,
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(p, q)| (p - q).powi(2)).sum()
}

/// Index and squared distance of the closest centroid; ties go to the lowest index.
fn nearest(centroids: &[Vec<f64>], row: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (idx, c) in centroids.iter().enumerate() {
        let d = sq_dist(c, row);
        if d < best.1 {
            best = (idx, d);
        }
    }
    best
}

impl KMeans {
    /// Fits `params.n_init` seeded runs and keeps the lowest-inertia one.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::EmptyBatch`] if `x` has no rows.
    pub fn fit(x: &[Vec<f64>], params: KMeansParams) -> Result<Self, TrainingError> {
        let n = x.len();
        if n == 0 {
            return Err(TrainingError::EmptyBatch);
        }
        let k = params.n_clusters.clamp(1, n);
        if k < params.n_clusters {
            warn!(
                requested = params.n_clusters,
                effective = k,
                "fewer counties than clusters; clamping cluster count"
            );
        }

        let tol = params.tol * mean_variance(x);
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut best: Option<(Vec<Vec<f64>>, f64)> = None;

        for _ in 0..params.n_init.max(1) {
            let seeds = plus_plus_init(x, k, &mut rng);
            let (centroids, inertia) = lloyd(x, seeds, params.max_iter, tol);
            if best.as_ref().is_none_or(|(_, b)| inertia < *b) {
                best = Some((centroids, inertia));
            }
        }

        let (centroids, inertia) = best.ok_or(TrainingError::EmptyBatch)?;
        Ok(Self {
            n_clusters: params.n_clusters,
            centroids,
            inertia,
        })
    }

    /// Cluster id of the nearest centroid.
    pub fn predict_row(&self, row: &[f64]) -> usize {
        nearest(&self.centroids, row).0
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<usize> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }

    /// Configured number of clusters.
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Sum of squared distances of training rows to their centroid.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub(crate) fn is_consistent(&self, n_features: usize) -> bool {
        !self.centroids.is_empty()
            && self.centroids.len() <= self.n_clusters
            && self
                .centroids
                .iter()
                .all(|c| c.len() == n_features && c.iter().all(|v| v.is_finite()))
    }
}

fn mean_variance(x: &[Vec<f64>]) -> f64 {
    let n = x.len() as f64;
    let d = x[0].len();
    if d == 0 {
        return 0.0;
    }
    let total: f64 = (0..d)
        .map(|j| {
            let mean = x.iter().map(|r| r[j]).sum::<f64>() / n;
            x.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n
        })
        .sum();
    total / d as f64
}

/// K-means++ seeding: each new centre is drawn with probability proportional
/// to its squared distance from the centres chosen so far.
fn plus_plus_init(x: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = x.len();
    let mut centroids = vec![x[rng.random_range(0..n)].clone()];
    let mut d2: Vec<f64> = x.iter().map(|row| sq_dist(row, &centroids[0])).collect();

    while centroids.len() < k {
        let total: f64 = d2.iter().sum();
        let pick = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut acc = 0.0;
            let mut chosen = n - 1;
            for (i, d) in d2.iter().enumerate() {
                acc += d;
                if acc > target && *d > 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            rng.random_range(0..n)
        };
        let centre = x[pick].clone();
        for (d, row) in d2.iter_mut().zip(x) {
            *d = d.min(sq_dist(row, &centre));
        }
        centroids.push(centre);
    }
    centroids
}

/// Lloyd iterations. Empty clusters keep their previous centroid.
fn lloyd(
    x: &[Vec<f64>],
    mut centroids: Vec<Vec<f64>>,
    max_iter: usize,
    tol: f64,
) -> (Vec<Vec<f64>>, f64) {
    let d = x[0].len();
    for _ in 0..max_iter {
        let mut sums = vec![vec![0.0; d]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for row in x {
            let (c, _) = nearest(&centroids, row);
            counts[c] += 1;
            for (s, v) in sums[c].iter_mut().zip(row) {
                *s += v;
            }
        }

        let mut shift = 0.0;
        for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
            if count == 0 {
                continue;
            }
            let updated: Vec<f64> = sum.iter().map(|s| s / count as f64).collect();
            shift += sq_dist(centroid, &updated);
            *centroid = updated;
        }
        if shift <= tol {
            break;
        }
    }
    let inertia = x.iter().map(|row| nearest(&centroids, row).1).sum();
    (centroids, inertia)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(k: usize) -> KMeansParams {
        KMeansParams {
            n_clusters: k,
            n_init: 5,
            max_iter: 100,
            tol: 1e-4,
            seed: 42,
        }
    }

    fn blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, -0.1],
            vec![-0.1, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 9.9],
            vec![9.9, 10.1],
        ]
    }

    #[test]
    fn separates_two_blobs() {
        let x = blobs();
        let km = KMeans::fit(&x, params(2)).expect("fit");
        let labels = km.predict(&x);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
        assert!(km.inertia() < 0.2);
    }

    #[test]
    fn fit_is_deterministic() {
        let x = blobs();
        let a = KMeans::fit(&x, params(3)).expect("fit");
        let b = KMeans::fit(&x, params(3)).expect("fit");
        assert_eq!(a, b);
    }

    #[test]
    fn clamps_k_to_row_count() {
        let x = vec![vec![1.0], vec![2.0]];
        let km = KMeans::fit(&x, params(3)).expect("fit");
        assert_eq!(km.n_clusters(), 3);
        assert!(km.is_consistent(1));
        let labels = km.predict(&x);
        assert!(labels.iter().all(|&l| l < 2));
        assert_ne!(labels[0], labels[1]);
    }

    #[test]
    fn identical_rows_share_a_cluster() {
        let x = vec![vec![5.0, 5.0]; 4];
        let km = KMeans::fit(&x, params(3)).expect("fit");
        let labels = km.predict(&x);
        assert!(labels.iter().all(|&l| l == labels[0]));
        assert_eq!(km.inertia(), 0.0);
    }
}
