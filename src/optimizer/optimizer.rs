//! Space-filling grid search scored by cross-validated ROC-AUC

use crate::error::{PunctualityError, Result};
use crate::preprocessing::ModelingTable;
use crate::training::{roc_auc, roc_curve, CVSplit, ModelKind, ModelSpec, RocPoint, Workflow};
use crate::utils::{mean, ParallelConfig, Timer};
use super::cache::{ArtifactCache, TuningFingerprint};
use super::config::OptimizationConfig;
use super::samplers::create_sampler;
use super::search_space::TrialParams;
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

/// Resampled performance of one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub params: TrialParams,
    pub metric: String,
    pub estimator: String,
    /// Mean of the per-fold metric
    pub mean: f64,
    /// Folds that produced a metric
    pub n: usize,
    /// Standard error of the mean, absent with fewer than two folds
    pub std_err: Option<f64>,
    pub config: String,
}

/// Winning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestParams {
    pub params: TrialParams,
    pub config: String,
}

/// Everything a search leaves behind for one model family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningArtifacts {
    pub model: ModelKind,
    pub best_params: BestParams,
    /// ROC curve of the winning configuration's out-of-fold predictions
    pub roc_curve: Vec<RocPoint>,
    /// Best configurations first
    pub leaderboard: Vec<LeaderboardEntry>,
}

impl TuningArtifacts {
    /// Cross-validated metric of the winning configuration
    pub fn cv_roc_auc(&self) -> Option<f64> {
        self.leaderboard
            .iter()
            .find(|e| e.config == self.best_params.config)
            .map(|e| e.mean)
    }

    /// Model specification for the winning configuration
    pub fn best_spec(&self, seed: u64) -> Result<ModelSpec> {
        ModelSpec::from_params(self.model, &self.best_params.params, seed)
    }
}

/// Label for the i-th candidate of a design
pub fn config_label(index: usize) -> String {
    format!("Config{:03}", index + 1)
}

/// Outcome of one (configuration, fold) task
struct FoldOutcome {
    config_idx: usize,
    fold_idx: usize,
    auc: Option<f64>,
    labels: Array1<f64>,
    proba: Array1<f64>,
}

/// Grid tuner over a space-filling design.
///
/// Owns the worker pool; every search and any work passed to
/// [`install`](Self::install) shares it.
pub struct Tuner {
    config: OptimizationConfig,
    pool: rayon::ThreadPool,
}

impl Tuner {
    pub fn new(config: OptimizationConfig) -> Result<Self> {
        let mut parallel = ParallelConfig::new();
        if let Some(n) = config.n_threads {
            parallel = parallel.with_threads(n);
        }
        let pool = parallel.build_pool()?;
        Ok(Self { config, pool })
    }

    /// Run `op` on the tuning pool, so nested rayon work stays inside it
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    pub fn n_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// Evaluate every candidate on every fold and rank the candidates.
    ///
    /// Fold indices refer to rows of `table`. Every task fits its own recipe
    /// on the analysis rows of its fold.
    pub fn tune(&self, kind: ModelKind, table: &ModelingTable, folds: &[CVSplit]) -> Result<TuningArtifacts> {
        if folds.is_empty() {
            return Err(PunctualityError::TuningError("no resamples to tune on".to_string()));
        }
        let timer = Timer::start();
        let seed = self.config.random_state;
        let space = kind.search_space();
        let design = create_sampler(self.config.sampler, seed).design(&space, self.config.n_configs);

        info!(
            model = kind.name(),
            configs = design.len(),
            folds = folds.len(),
            "Tuning"
        );

        let tasks: Vec<(usize, usize)> = (0..design.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();

        let outcomes: Vec<std::result::Result<FoldOutcome, (usize, String)>> = self.pool.install(|| {
            tasks
                .par_iter()
                .map(|&(config_idx, fold_idx)| {
                    evaluate(kind, &design[config_idx], seed, table, &folds[fold_idx])
                        .map(|(auc, labels, proba)| FoldOutcome {
                            config_idx,
                            fold_idx,
                            auc,
                            labels,
                            proba,
                        })
                        .map_err(|e| (config_idx, e.to_string()))
                })
                .collect()
        });

        let mut per_config: Vec<Vec<FoldOutcome>> = (0..design.len()).map(|_| Vec::new()).collect();
        let mut failed = vec![false; design.len()];
        for outcome in outcomes {
            match outcome {
                Ok(o) => per_config[o.config_idx].push(o),
                Err((config_idx, reason)) => {
                    if !failed[config_idx] {
                        warn!(model = kind.name(), config = %config_label(config_idx), %reason, "Configuration failed");
                    }
                    failed[config_idx] = true;
                }
            }
        }

        let metric = self.config.metric.name().to_string();
        let mut ranked: Vec<LeaderboardEntry> = Vec::new();
        for (idx, outcomes) in per_config.iter().enumerate() {
            if failed[idx] {
                continue;
            }
            let aucs: Vec<f64> = outcomes.iter().filter_map(|o| o.auc).collect();
            let Some(m) = mean(&aucs) else { continue };
            let entry = LeaderboardEntry {
                params: design[idx].clone(),
                metric: metric.clone(),
                estimator: "binary".to_string(),
                mean: m,
                n: aucs.len(),
                std_err: std_err(&aucs, m),
                config: config_label(idx),
            };
            if self.config.verbose {
                info!(model = kind.name(), config = %entry.config, mean = entry.mean, "Configuration scored");
            }
            ranked.push(entry);
        }

        ranked.sort_by(|a, b| {
            b.mean
                .partial_cmp(&a.mean)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.config.cmp(&b.config))
        });
        let best = ranked.first().cloned().ok_or_else(|| {
            PunctualityError::TuningError(format!("every {} configuration failed", kind.name()))
        })?;

        let best_idx = design
            .iter()
            .position(|p| *p == best.params)
            .ok_or_else(|| PunctualityError::TuningError("best configuration not in design".to_string()))?;
        let curve = pooled_roc(&mut per_config[best_idx]);

        ranked.truncate(self.config.leaderboard_size.max(1));
        info!(
            model = kind.name(),
            config = %best.config,
            roc_auc = best.mean,
            elapsed_secs = timer.elapsed_secs(),
            "Tuning finished"
        );

        Ok(TuningArtifacts {
            model: kind,
            best_params: BestParams {
                params: best.params,
                config: best.config,
            },
            roc_curve: curve,
            leaderboard: ranked,
        })
    }

    /// Load the model's artifacts from `cache` when they were produced with
    /// the same design size, seed, sampler and folds; otherwise tune and
    /// store them. `force` always tunes.
    pub fn tune_or_load(
        &self,
        kind: ModelKind,
        table: &ModelingTable,
        folds: &[CVSplit],
        cache: &ArtifactCache,
        force: bool,
    ) -> Result<TuningArtifacts> {
        let fingerprint = TuningFingerprint::new(&self.config, folds);
        if !force && cache.exists(kind) {
            match cache.fingerprint(kind)? {
                Some(stored) if stored == fingerprint => return cache.load(kind),
                stored => info!(
                    model = kind.name(),
                    cached = ?stored,
                    requested = ?fingerprint,
                    "Cached artifacts were tuned with other settings, re-tuning"
                ),
            }
        }
        let artifacts = self.tune(kind, table, folds)?;
        cache.save(&artifacts)?;
        cache.save_fingerprint(kind, &fingerprint)?;
        Ok(artifacts)
    }
}

fn evaluate(
    kind: ModelKind,
    params: &TrialParams,
    seed: u64,
    table: &ModelingTable,
    fold: &CVSplit,
) -> Result<(Option<f64>, Array1<f64>, Array1<f64>)> {
    let spec = ModelSpec::from_params(kind, params, seed)?;
    let fitted = Workflow::new(spec).fit(table, &fold.train_indices)?;
    let proba = fitted.predict_proba(table, &fold.test_indices)?;
    let labels = table.labels(&fold.test_indices);
    let auc = roc_auc(&labels, &proba);
    debug!(model = kind.name(), fold = fold.fold_idx, roc_auc = ?auc, "Fold scored");
    Ok((auc, labels, proba))
}

fn std_err(values: &[f64], m: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1.0);
    Some((var / n).sqrt())
}

/// ROC curve over the out-of-fold predictions of all folds together
fn pooled_roc(outcomes: &mut [FoldOutcome]) -> Vec<RocPoint> {
    outcomes.sort_by_key(|o| o.fold_idx);
    let labels: Vec<f64> = outcomes.iter().flat_map(|o| o.labels.iter().copied()).collect();
    let proba: Vec<f64> = outcomes.iter().flat_map(|o| o.proba.iter().copied()).collect();
    roc_curve(&Array1::from_vec(labels), &Array1::from_vec(proba))
}
