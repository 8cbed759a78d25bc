//! CART regression tree with variance-reduction splits.

use serde::{Deserialize, Serialize};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    /// Maximum depth; the root is depth 0.
    pub max_depth: usize,
    /// Minimum samples at a node before a split is attempted.
    pub min_samples_split: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree stored as a flat node arena (root at index 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl RegressionTree {
    /// Grows a tree on the rows of `x` selected by `samples` (duplicates allowed).
    ///
    /// Returns the tree and the total squared-error reduction attributed to each
    /// feature, which the forest turns into impurity importances.
    ///
    /// `samples` must be non-empty and every row of `x` must have `n_features`
    /// entries.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        samples: Vec<usize>,
        n_features: usize,
        params: TreeParams,
    ) -> (Self, Vec<f64>) {
        let mut tree = Self { nodes: Vec::new() };
        let mut gains = vec![0.0; n_features];
        tree.grow(x, y, samples, 0, n_features, params, &mut gains);
        (tree, gains)
    }

    /// Predicts the target for one feature row.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if v <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Checks that every split points at existing nodes and features.
    pub(crate) fn is_consistent(&self, n_features: usize) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(i, node)| match node {
                Node::Leaf { value } => value.is_finite(),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    *feature < n_features
                        && threshold.is_finite()
                        && *left > i
                        && *right > i
                        && *left < self.nodes.len()
                        && *right < self.nodes.len()
                }
            })
    }

    #[expect(clippy::too_many_arguments)]
    fn grow(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        samples: Vec<usize>,
        depth: usize,
        n_features: usize,
        params: TreeParams,
        gains: &mut [f64],
    ) -> usize {
        let n = samples.len() as f64;
        let sum: f64 = samples.iter().map(|&i| y[i]).sum();
        let mean = sum / n;
        let sse: f64 = samples.iter().map(|&i| (y[i] - mean).powi(2)).sum();

        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });

        if depth >= params.max_depth || samples.len() < params.min_samples_split || sse <= 1e-12
        {
            return node_idx;
        }

        let Some(best) = best_split(x, y, &samples, sse, n_features) else {
            return node_idx;
        };

        gains[best.feature] += best.gain;
        let left = self.grow(x, y, best.left, depth + 1, n_features, params, gains);
        let right = self.grow(x, y, best.right, depth + 1, n_features, params, gains);
        self.nodes[node_idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        node_idx
    }
}

/// Exhaustive search for the split with the largest squared-error reduction.
///
/// Ties keep the first candidate found (lowest feature, lowest threshold).
fn best_split(
    x: &[Vec<f64>],
    y: &[f64],
    samples: &[usize],
    parent_sse: f64,
    n_features: usize,
) -> Option<BestSplit> {
    let n = samples.len();
    let mut best: Option<(usize, f64, f64)> = None;

    let mut order = samples.to_vec();
    for feature in 0..n_features {
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]).then(a.cmp(&b)));

        let total_sum: f64 = order.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = order.iter().map(|&i| y[i] * y[i]).sum();
        let mut left_sum = 0.0;
        let mut left_sq = 0.0;

        for pos in 1..n {
            let prev = order[pos - 1];
            left_sum += y[prev];
            left_sq += y[prev] * y[prev];

            let lo = x[prev][feature];
            let hi = x[order[pos]][feature];
            if lo == hi {
                continue;
            }

            let n_left = pos as f64;
            let n_right = (n - pos) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse_left = (left_sq - left_sum * left_sum / n_left).max(0.0);
            let sse_right = (right_sq - right_sum * right_sum / n_right).max(0.0);
            let gain = parent_sse - sse_left - sse_right;

            if gain > 1e-12 && best.is_none_or(|(_, _, g)| gain > g) {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some((feature, threshold, gain));
            }
        }
    }

    let (feature, threshold, gain) = best?;
    let (left, right): (Vec<usize>, Vec<usize>) = samples
        .iter()
        .copied()
        .partition(|&i| x[i][feature] <= threshold);
    Some(BestSplit {
        feature,
        threshold,
        gain,
        left,
        right,
    })
}
