//! Predictor importance for a fitted workflow

use crate::error::{PunctualityError, Result};
use crate::preprocessing::ModelingTable;
use crate::training::{roc_auc, FittedWorkflow};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How importance was measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportanceMethod {
    /// Impurity decrease or split gain accumulated while fitting
    Native,
    /// Drop in ROC-AUC when a predictor's values are shuffled
    Permutation,
}

impl ImportanceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportanceMethod::Native => "native",
            ImportanceMethod::Permutation => "permutation (ROC-AUC drop)",
        }
    }
}

/// Importance of one predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorImportance {
    pub predictor: String,
    pub importance: f64,
    /// Spread over permutation repeats
    pub std: Option<f64>,
}

/// Result of feature importance computation, most important first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceResult {
    pub method: ImportanceMethod,
    pub entries: Vec<PredictorImportance>,
}

impl ImportanceResult {
    fn sorted(method: ImportanceMethod, mut entries: Vec<PredictorImportance>) -> Self {
        entries.sort_by(|a, b| b.importance.partial_cmp(&a.importance).unwrap_or(Ordering::Equal));
        Self { method, entries }
    }

    pub fn get(&self, predictor: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.predictor == predictor)
            .map(|e| e.importance)
    }
}

/// Permutation importance over groups of matrix columns.
///
/// Columns sharing a group name are shuffled together with one row
/// permutation, so indicator columns of a category move as a unit.
pub struct PermutationImportance<F>
where
    F: Fn(&Array2<f64>) -> Result<Array1<f64>>,
{
    predict_fn: F,
    groups: Vec<String>,
    n_repeats: usize,
    seed: u64,
}

impl<F> PermutationImportance<F>
where
    F: Fn(&Array2<f64>) -> Result<Array1<f64>>,
{
    /// `groups[j]` names the predictor matrix column `j` belongs to
    pub fn new(predict_fn: F, groups: Vec<String>) -> Self {
        Self {
            predict_fn,
            groups,
            n_repeats: 5,
            seed: 42,
        }
    }

    /// Set number of permutation repeats
    pub fn with_n_repeats(mut self, n_repeats: usize) -> Self {
        self.n_repeats = n_repeats.max(1);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Mean and spread of the ROC-AUC drop per group
    pub fn compute(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<ImportanceResult> {
        if self.groups.len() != x.ncols() {
            return Err(PunctualityError::ShapeError {
                expected: format!("{} column groups", x.ncols()),
                actual: format!("{} column groups", self.groups.len()),
            });
        }
        let score = |x: &Array2<f64>| -> Result<f64> {
            let proba = (self.predict_fn)(x)?;
            roc_auc(y, &proba).ok_or_else(|| {
                PunctualityError::ValidationError("importance rows must contain both classes".to_string())
            })
        };
        let baseline = score(x)?;

        let mut names: Vec<&str> = Vec::new();
        for g in &self.groups {
            if !names.contains(&g.as_str()) {
                names.push(g);
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..x.nrows()).collect();
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let columns: Vec<usize> = (0..self.groups.len()).filter(|&j| self.groups[j] == name).collect();
            let mut drops = Vec::with_capacity(self.n_repeats);
            for _ in 0..self.n_repeats {
                order.shuffle(&mut rng);
                let mut permuted = x.clone();
                for &j in &columns {
                    for (i, &src) in order.iter().enumerate() {
                        permuted[[i, j]] = x[[src, j]];
                    }
                }
                drops.push(baseline - score(&permuted)?);
            }
            let mean = drops.iter().sum::<f64>() / drops.len() as f64;
            let var = drops.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / drops.len() as f64;
            entries.push(PredictorImportance {
                predictor: name.to_string(),
                importance: mean,
                std: Some(var.sqrt()),
            });
        }

        Ok(ImportanceResult::sorted(ImportanceMethod::Permutation, entries))
    }
}

/// Importance of the four predictors for a fitted workflow.
///
/// Tree models report their native importance with indicator columns summed
/// back into their predictor, as shares summing to 1. Other models are scored
/// by permutation on `rows`.
pub fn predictor_importance(
    fitted: &FittedWorkflow,
    table: &ModelingTable,
    rows: &[usize],
    seed: u64,
) -> Result<ImportanceResult> {
    if let Some(native) = fitted.native_importance() {
        let entries = native
            .into_iter()
            .map(|(predictor, importance)| PredictorImportance {
                predictor,
                importance,
                std: None,
            })
            .collect();
        return Ok(ImportanceResult::sorted(ImportanceMethod::Native, entries));
    }

    let x = fitted.bake(table, rows)?;
    let y = table.labels(rows);
    let groups = fitted
        .recipe()
        .feature_groups()
        .into_iter()
        .map(String::from)
        .collect();
    PermutationImportance::new(|m: &Array2<f64>| fitted.predict_proba_baked(m), groups)
        .with_seed(seed)
        .compute(&x, &y)
}
