//! End-to-end pipeline: prepare, resample, tune, select, finalise, report

use crate::config::{PipelineConfig, SplitConfig};
use crate::error::{PunctualityError, Result};
use crate::evaluation::{analyse_false_negatives, compare_models, last_fit, roc_overlay, select_best, LastFit};
use crate::explainability::{predictor_importance, ImportanceResult};
use crate::export::{ModelLeaderboard, Report, RunSummary, SplitSummary};
use crate::optimizer::{ArtifactCache, Tuner, TuningArtifacts};
use crate::preprocessing::{prepare, ModelingTable, PreparedData};
use crate::training::{initial_split, resolve_splits, CVSplit, CVStrategy, CrossValidator, ModelKind, TrainTestSplit};
use crate::utils::{SourceFrames, Timer};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Grid resolution of the reported ROC overlay
const OVERLAY_STEPS: usize = 20;

/// The train/test split and the folds shared by every trainer
#[derive(Debug, Clone)]
pub struct Resamples {
    pub split: TrainTestSplit,
    /// Fold indices are rows of the modeling table
    pub folds: Arc<Vec<CVSplit>>,
}

impl Resamples {
    /// Stratified split, then shuffled k-fold over the training partition
    pub fn new(table: &ModelingTable, config: &SplitConfig) -> Result<Self> {
        let split = initial_split(&table.all_labels(), config.train_fraction, config.seed)?;
        let positions = CrossValidator::new(CVStrategy::KFold {
            n_splits: config.n_folds,
            shuffle: true,
        })
        .with_random_state(config.seed)
        .split(split.n_train(), None)?;
        let folds = resolve_splits(&positions, &split.train_indices);

        info!(
            train = split.n_train(),
            test = split.n_test(),
            folds = folds.len(),
            "Resamples created"
        );
        Ok(Self {
            split,
            folds: Arc::new(folds),
        })
    }

    pub fn summary(&self, table: &ModelingTable) -> SplitSummary {
        let share = |rows: &[usize]| {
            if rows.is_empty() {
                0.0
            } else {
                rows.iter().filter(|&&i| table.records[i].is_late).count() as f64 / rows.len() as f64
            }
        };
        SplitSummary {
            n_train: self.split.n_train(),
            n_test: self.split.n_test(),
            train_prevalence: share(&self.split.train_indices),
            test_prevalence: share(&self.split.test_indices),
        }
    }
}

/// Runs the pipeline stages with one configuration
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Description of the data source for the report
    pub fn source_label(&self) -> String {
        match &self.config.source.input {
            Some(path) => path.display().to_string(),
            None => self.config.source.url.clone(),
        }
    }

    /// Extract, clean and engineer the modeling table
    pub fn prepare(&self, frames: &SourceFrames) -> Result<PreparedData> {
        let timer = Timer::start();
        let prepared = prepare(frames)?;
        if prepared.table.is_empty() {
            return Err(PunctualityError::DataError(
                "no modeling rows left after cleaning".to_string(),
            ));
        }
        info!(rows = prepared.table.len(), elapsed_secs = timer.elapsed_secs(), "Data prepared");
        Ok(prepared)
    }

    /// Tuner owning the worker pool for this run
    pub fn tuner(&self) -> Result<Tuner> {
        Tuner::new(self.config.tuning.clone())
    }

    /// Tune one model family, reusing cached artifacts unless forced
    pub fn tune(
        &self,
        tuner: &Tuner,
        kind: ModelKind,
        table: &ModelingTable,
        resamples: &Resamples,
    ) -> Result<TuningArtifacts> {
        let cache = ArtifactCache::new(&self.config.output.cache_dir);
        tuner.tune_or_load(
            kind,
            table,
            &resamples.folds,
            &cache,
            self.config.output.force_retune,
        )
    }

    /// Refit the winner on the training partition, score it on the test
    /// partition and rank its predictors, all on the tuner's pool
    pub fn finalise(
        &self,
        tuner: &Tuner,
        best: &TuningArtifacts,
        table: &ModelingTable,
        resamples: &Resamples,
    ) -> Result<(LastFit, ImportanceResult)> {
        let seed = self.config.tuning.random_state;
        tuner.install(|| {
            let finalised = last_fit(best, table, &resamples.split, seed)?;
            let importance =
                predictor_importance(&finalised.workflow, table, &resamples.split.test_indices, seed)?;
            Ok((finalised, importance))
        })
    }

    /// Run every stage after loading and assemble the report
    pub fn run(&self, frames: &SourceFrames) -> Result<Report> {
        let prepared = self.prepare(frames)?;
        let table = &prepared.table;
        let resamples = Resamples::new(table, &self.config.split)?;

        // Trainers run one after another on the same pool
        let tuner = self.tuner()?;
        let artifacts = ModelKind::ALL
            .iter()
            .map(|&kind| self.tune(&tuner, kind, table, &resamples))
            .collect::<Result<Vec<_>>>()?;

        let comparison = compare_models(&artifacts);
        let best = select_best(&artifacts)?;
        info!(model = best.model.name(), cv_roc_auc = ?best.cv_roc_auc(), "Model selected");

        let seed = self.config.tuning.random_state;
        let (finalised, importance) = self.finalise(&tuner, best, table, &resamples)?;
        let error_analysis = analyse_false_negatives(table, &finalised.predictions);

        Ok(Report {
            generated_at: Utc::now(),
            run: RunSummary {
                source: self.source_label(),
                seed,
                n_folds: self.config.split.n_folds,
                n_configs: self.config.tuning.n_configs,
                train_fraction: self.config.split.train_fraction,
            },
            cleaning: prepared.cleaning.clone(),
            features: prepared.features.clone(),
            split: resamples.summary(table),
            comparison,
            leaderboards: artifacts.iter().map(ModelLeaderboard::from_artifacts).collect(),
            roc_overlay: roc_overlay(&artifacts, OVERLAY_STEPS),
            final_model: finalised.evaluation,
            importance,
            error_analysis,
        })
    }
}
