//! Probability decision tree for binary labels
//!
//! Leaves hold the share of positive rows that reached them, so a tree
//! predicts P(label = 1) directly. Split candidates are found with one sort
//! per feature per node and a running positive count.

use crate::error::{PunctualityError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with the positive-class probability
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Gini impurity of a node with `pos` positives out of `n` rows
fn gini(pos: f64, n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    let p = pos / n;
    2.0 * p * (1.0 - p)
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Nodes with fewer rows are not split
    pub min_samples_split: usize,
    /// Features drawn at random for each node (None = all)
    pub max_features: Option<usize>,
    /// Number of features
    n_features: usize,
    /// Summed weighted impurity decrease per feature
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    /// Create a new tree
    pub fn new() -> Self {
        Self {
            root: None,
            min_samples_split: 2,
            max_features: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set the number of features tried per node
    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = Some(n);
        self
    }

    /// Fit the tree on every row
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_rows(x, y, indices, &mut rng)?;
        Ok(self)
    }

    /// Fit the tree on the given rows (repeats allowed, as in a bootstrap sample)
    pub fn fit_rows(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        rng: &mut ChaCha8Rng,
    ) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(PunctualityError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if indices.is_empty() {
            return Err(PunctualityError::ValidationError(
                "cannot fit a tree on zero rows".to_string(),
            ));
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];
        self.root = Some(self.build_tree(x, y, indices, &mut importances, rng));
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(())
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let pos: f64 = indices.iter().map(|&i| y[i]).sum();
        let value = pos / n_samples as f64;

        let should_stop = n_samples < self.min_samples_split
            || pos == 0.0
            || pos == n_samples as f64;

        if should_stop {
            return TreeNode::Leaf { value, n_samples };
        }

        let features = self.draw_features(rng);
        let parent_impurity = gini(pos, n_samples as f64);

        match self.find_best_split(x, y, &indices, &features, parent_impurity, pos) {
            Some(split) => {
                importances[split.feature_idx] += n_samples as f64 * split.gain;

                let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                    .into_iter()
                    .partition(|&i| x[[i, split.feature_idx]] <= split.threshold);

                let left = Box::new(self.build_tree(x, y, left_indices, importances, rng));
                let right = Box::new(self.build_tree(x, y, right_indices, importances, rng));

                TreeNode::Split {
                    feature_idx: split.feature_idx,
                    threshold: split.threshold,
                    left,
                    right,
                    n_samples,
                    impurity: parent_impurity,
                }
            }
            None => TreeNode::Leaf { value, n_samples },
        }
    }

    fn draw_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let n = self.n_features;
        match self.max_features {
            Some(k) if k < n => sample(rng, n, k.max(1)).into_vec(),
            _ => (0..n).collect(),
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
        total_pos: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let mut best: Option<SplitCandidate> = None;
        let mut column: Vec<(f64, f64)> = Vec::with_capacity(n);

        for &feature_idx in features {
            column.clear();
            column.extend(indices.iter().map(|&i| (x[[i, feature_idx]], y[i])));
            column.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_pos = 0.0;
            for k in 0..n - 1 {
                left_pos += column[k].1;
                let left_n = k + 1;
                let right_n = n - left_n;

                if column[k].0 == column[k + 1].0 {
                    continue;
                }
                let weighted = (left_n as f64 * gini(left_pos, left_n as f64)
                    + right_n as f64 * gini(total_pos - left_pos, right_n as f64))
                    / n as f64;
                let gain = parent_impurity - weighted;

                if gain > best.map_or(1e-12, |b| b.gain) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold: (column[k].0 + column[k + 1].0) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    /// Positive-class probability of one row
    pub fn predict_row(&self, sample: ArrayView1<f64>) -> Result<f64> {
        let mut node = self.root.as_ref().ok_or(PunctualityError::ModelNotFitted)?;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return Ok(*value),
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}
