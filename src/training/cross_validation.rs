//! Train/test splitting and cross-validation folds

use crate::error::{PunctualityError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stratified train/test partition of row indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

impl TrainTestSplit {
    pub fn n_train(&self) -> usize {
        self.train_indices.len()
    }

    pub fn n_test(&self) -> usize {
        self.test_indices.len()
    }
}

/// Split rows by label so both partitions keep the class proportions.
///
/// Each class is shuffled on its own and `floor(n_class * train_fraction)`
/// of its rows go to training. Indices are returned in ascending order.
pub fn initial_split(y: &Array1<f64>, train_fraction: f64, seed: u64) -> Result<TrainTestSplit> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(PunctualityError::InvalidParameter {
            name: "train_fraction".to_string(),
            value: train_fraction.to_string(),
            reason: "must lie strictly between 0 and 1".to_string(),
        });
    }
    if y.is_empty() {
        return Err(PunctualityError::ValidationError(
            "cannot split an empty table".to_string(),
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_indices = Vec::new();
    let mut test_indices = Vec::new();

    for mut members in class_members(y).into_values() {
        members.shuffle(&mut rng);
        let n_train = (members.len() as f64 * train_fraction).floor() as usize;
        train_indices.extend_from_slice(&members[..n_train]);
        test_indices.extend_from_slice(&members[n_train..]);
    }

    train_indices.sort_unstable();
    test_indices.sort_unstable();

    Ok(TrainTestSplit {
        train_indices,
        test_indices,
    })
}

/// Row indices per class label, in ascending class order
fn class_members(y: &Array1<f64>) -> BTreeMap<i64, Vec<usize>> {
    let mut classes: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, &val) in y.iter().enumerate() {
        classes.entry(val.round() as i64).or_default().push(idx);
    }
    classes
}

/// Cross-validation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold { n_splits: 10, shuffle: true }
    }
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match self {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => *n_splits,
        }
    }
}

/// One resample: analysis rows fit the recipe and model, assessment rows score it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> &CVStrategy {
        &self.strategy
    }

    /// Generate splits over positions `0..n_samples`.
    ///
    /// `y` is required for the stratified strategy.
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => self.k_fold_split(n_samples, *n_splits, *shuffle),
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = y.ok_or_else(|| {
                    PunctualityError::ValidationError("StratifiedKFold requires target array".to_string())
                })?;
                self.stratified_k_fold_split(n_samples, y, *n_splits, *shuffle)
            }
        }
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    fn check_sizes(n_samples: usize, n_splits: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(PunctualityError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(PunctualityError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }
        Ok(())
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        Self::check_sizes(n_samples, n_splits)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut folds = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            folds.push(indices[current..current + fold_size].to_vec());
            current += fold_size;
        }

        Ok(Self::splits_from_folds(folds))
    }

    fn stratified_k_fold_split(
        &self,
        n_samples: usize,
        y: &Array1<f64>,
        n_splits: usize,
        shuffle: bool,
    ) -> Result<Vec<CVSplit>> {
        Self::check_sizes(n_samples, n_splits)?;
        if y.len() != n_samples {
            return Err(PunctualityError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        let mut rng = self.rng();
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        // Continue the round robin across classes so fold sizes stay balanced
        let mut slot = 0;
        for mut members in class_members(y).into_values() {
            if shuffle {
                members.shuffle(&mut rng);
            }
            for idx in members {
                folds[slot % n_splits].push(idx);
                slot += 1;
            }
        }

        Ok(Self::splits_from_folds(folds))
    }

    fn splits_from_folds(folds: Vec<Vec<usize>>) -> Vec<CVSplit> {
        (0..folds.len())
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect()
    }
}

/// Map fold positions (into the training partition) back to table rows
pub fn resolve_splits(splits: &[CVSplit], rows: &[usize]) -> Vec<CVSplit> {
    splits
        .iter()
        .map(|s| CVSplit {
            train_indices: s.train_indices.iter().map(|&i| rows[i]).collect(),
            test_indices: s.test_indices.iter().map(|&i| rows[i]).collect(),
            fold_idx: s.fold_idx,
        })
        .collect()
}
