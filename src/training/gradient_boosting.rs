//! Gradient boosting with second-order (Newton) tree fitting
//!
//! - Logistic loss: grad = p - y, hess = p(1 - p)
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Split gain: 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)], kept when above gamma
//! - Minimum child hessian (min_child_weight) and per-tree row subsampling
//!
//! Split search runs on quantile histograms: each feature is cut into at
//! most `max_bins` bins once per fit, so a node costs one pass over its rows.

use crate::error::{PunctualityError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Minimum hessian sum in a child
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    /// Share of rows drawn (without replacement) for each tree
    pub subsample: f64,
    /// Histogram resolution per feature
    pub max_bins: usize,
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            subsample: 1.0,
            max_bins: 256,
            random_state: Some(42),
        }
    }
}

/// A single node of a boosted tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum BoostNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        /// Rows with value <= threshold go left
        threshold: f64,
        /// Same decision in bin space
        bin: u16,
        left: Box<BoostNode>,
        right: Box<BoostNode>,
    },
}

impl BoostNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            BoostNode::Leaf { weight } => *weight,
            BoostNode::Split { feature, threshold, left, right, .. } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn predict_binned(&self, bins: ArrayView1<u16>) -> f64 {
        match self {
            BoostNode::Leaf { weight } => *weight,
            BoostNode::Split { feature, bin, left, right, .. } => {
                if bins[*feature] <= *bin {
                    left.predict_binned(bins)
                } else {
                    right.predict_binned(bins)
                }
            }
        }
    }
}

/// Quantile cut points per feature and the binned training matrix
struct BinnedMatrix {
    cuts: Vec<Vec<f64>>,
    bins: Array2<u16>,
}

impl BinnedMatrix {
    fn new(x: &Array2<f64>, max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(2, u16::MAX as usize);
        let cuts: Vec<Vec<f64>> = x
            .columns()
            .into_iter()
            .map(|col| quantile_cuts(col, max_bins))
            .collect();

        let mut bins = Array2::<u16>::zeros(x.dim());
        for ((i, j), b) in bins.indexed_iter_mut() {
            *b = bin_of(&cuts[j], x[[i, j]]);
        }

        Self { cuts, bins }
    }
}

/// Upper bin edges: the distinct values when few, otherwise sample quantiles
fn quantile_cuts(col: ArrayView1<f64>, max_bins: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = col.iter().copied().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut distinct = sorted.clone();
    distinct.dedup();
    if distinct.len() <= max_bins {
        return distinct;
    }

    let n = sorted.len();
    let mut cuts: Vec<f64> = (1..=max_bins)
        .map(|k| sorted[((k * n).div_ceil(max_bins)).saturating_sub(1).min(n - 1)])
        .collect();
    cuts.dedup();
    cuts
}

fn bin_of(cuts: &[f64], value: f64) -> u16 {
    let pos = cuts.partition_point(|&c| c < value);
    pos.min(cuts.len().saturating_sub(1)) as u16
}

struct GrowContext<'a> {
    binned: &'a BinnedMatrix,
    grad: &'a [f64],
    hess: &'a [f64],
    config: &'a GradientBoostingConfig,
}

struct BestSplit {
    feature: usize,
    bin: u16,
    gain: f64,
}

fn leaf_weight(g_sum: f64, h_sum: f64, lambda: f64) -> f64 {
    -g_sum / (h_sum + lambda)
}

fn grow(ctx: &GrowContext, indices: Vec<usize>, depth: usize, gains: &mut [f64]) -> BoostNode {
    let g_sum: f64 = indices.iter().map(|&i| ctx.grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| ctx.hess[i]).sum();
    let weight = leaf_weight(g_sum, h_sum, ctx.config.reg_lambda);

    if depth >= ctx.config.max_depth || indices.len() < 2 || h_sum < ctx.config.min_child_weight {
        return BoostNode::Leaf { weight };
    }

    match best_split(ctx, &indices, g_sum, h_sum) {
        Some(split) if split.gain > ctx.config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .into_iter()
                .partition(|&i| ctx.binned.bins[[i, split.feature]] <= split.bin);

            gains[split.feature] += split.gain;
            let left = grow(ctx, left_idx, depth + 1, gains);
            let right = grow(ctx, right_idx, depth + 1, gains);

            BoostNode::Split {
                feature: split.feature,
                threshold: ctx.binned.cuts[split.feature][split.bin as usize],
                bin: split.bin,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => BoostNode::Leaf { weight },
    }
}

fn best_split(ctx: &GrowContext, indices: &[usize], g_total: f64, h_total: f64) -> Option<BestSplit> {
    let lambda = ctx.config.reg_lambda;
    let mcw = ctx.config.min_child_weight;
    let parent_score = g_total * g_total / (h_total + lambda);
    let mut best: Option<BestSplit> = None;

    for (feature, cuts) in ctx.binned.cuts.iter().enumerate() {
        let n_bins = cuts.len();
        if n_bins < 2 {
            continue;
        }

        let mut hist_g = vec![0.0; n_bins];
        let mut hist_h = vec![0.0; n_bins];
        let mut hist_n = vec![0usize; n_bins];
        for &i in indices {
            let b = ctx.binned.bins[[i, feature]] as usize;
            hist_g[b] += ctx.grad[i];
            hist_h[b] += ctx.hess[i];
            hist_n[b] += 1;
        }

        let (mut g_left, mut h_left, mut n_left) = (0.0, 0.0, 0usize);
        for b in 0..n_bins - 1 {
            g_left += hist_g[b];
            h_left += hist_h[b];
            n_left += hist_n[b];

            let g_right = g_total - g_left;
            let h_right = h_total - h_left;
            if n_left == 0 || n_left == indices.len() {
                continue;
            }
            if h_left < mcw || h_right < mcw {
                continue;
            }

            let gain = 0.5
                * (g_left * g_left / (h_left + lambda)
                    + g_right * g_right / (h_right + lambda)
                    - parent_score);

            if best.as_ref().map_or(true, |s| gain > s.gain) {
                best = Some(BestSplit { feature, bin: b as u16, gain });
            }
        }
    }

    best
}

/// Boosted trees on the logistic loss, predicting P(label = 1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<BoostNode>,
    base_score: f64,
    n_features: usize,
    gain_importances: Vec<f64>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
            gain_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PunctualityError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PunctualityError::TrainingError(
                "gradient boosting needs at least one row".to_string(),
            ));
        }

        self.n_features = x.ncols();
        self.gain_importances = vec![0.0; self.n_features];

        // Base score in log-odds space
        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        self.base_score = (p / (1.0 - p)).ln();
        let mut raw_preds = Array1::from_elem(n_samples, self.base_score);

        let binned = BinnedMatrix::new(x, self.config.max_bins);
        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();
        let mut grad = vec![0.0; n_samples];
        let mut hess = vec![0.0; n_samples];

        for _ in 0..self.config.n_estimators {
            for i in 0..n_samples {
                let p = Self::sigmoid(raw_preds[i]);
                grad[i] = p - y[i];
                hess[i] = (p * (1.0 - p)).max(1e-16);
            }

            let rows = subsample(&mut rng, n_samples, self.config.subsample);
            let ctx = GrowContext {
                binned: &binned,
                grad: &grad,
                hess: &hess,
                config: &self.config,
            };
            let tree = grow(&ctx, rows, 0, &mut self.gain_importances);

            // every row moves, sampled or not
            for (i, bins) in binned.bins.rows().into_iter().enumerate() {
                raw_preds[i] += self.config.learning_rate * tree.predict_binned(bins);
            }

            self.trees.push(tree);
        }

        Ok(())
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() && self.config.n_estimators > 0 {
            return Err(PunctualityError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PunctualityError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.base_score
                    + self
                        .trees
                        .iter()
                        .map(|tree| self.config.learning_rate * tree.predict(row))
                        .sum::<f64>()
            })
            .collect())
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.raw_scores(x)?.mapv(Self::sigmoid))
    }

    /// Total split gain per feature across all trees
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 {
            return None;
        }
        Some(Array1::from_vec(self.gain_importances.clone()))
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).max(1);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((50, 2),
            (0..100).map(|i| i as f64 * 0.1).collect()
        ).unwrap();
        let y: Array1<f64> = x.rows().into_iter()
            .map(|r| if r[0] + r[1] > 5.0 { 1.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_classifier_fits_threshold() {
        let (x, y) = classification_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 50,
            max_depth: 4,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        let correct = proba.iter().zip(y.iter()).filter(|&(&p, &a)| (p > 0.5) == (a > 0.5)).count();
        assert!(correct as f64 / y.len() as f64 >= 0.9);
    }

    #[test]
    fn test_predict_proba_bounds() {
        let (x, y) = classification_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            subsample: 0.5,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), x.nrows());
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_tiny_learning_rate_stays_at_base_rate() {
        let (x, y) = classification_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 5,
            learning_rate: 1e-10,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        let base = y.mean().unwrap();
        assert!(proba.iter().all(|&p| (p - base).abs() < 1e-6));
    }

    #[test]
    fn test_gamma_blocks_splits() {
        let (x, y) = classification_data();
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 3,
            gamma: 1e6,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let imp = model.feature_importances().unwrap();
        assert_eq!(imp.sum(), 0.0);
    }

    #[test]
    fn test_quantile_cuts_cap_bins() {
        let col = Array1::from_iter((0..1000).map(|i| i as f64));
        let cuts = quantile_cuts(col.view(), 16);
        assert!(cuts.len() <= 16);
        assert_eq!(*cuts.last().unwrap(), 999.0);
        assert_eq!(bin_of(&cuts, 999.0) as usize, cuts.len() - 1);
        assert_eq!(bin_of(&cuts, -5.0), 0);
    }
}
