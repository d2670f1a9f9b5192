//! Model selection and the final fit on the whole training partition

use crate::error::{PunctualityError, Result};
use crate::optimizer::{TrialParams, TuningArtifacts};
use crate::preprocessing::ModelingTable;
use crate::training::{FittedWorkflow, ModelKind, ModelMetrics, TrainTestSplit, Workflow};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

/// Decision threshold on P(late) for class predictions
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Model comparison entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub model: ModelKind,
    pub cv_roc_auc: f64,
    pub best_config: String,
}

/// Cross-validated ROC-AUC of every tuned model, best first
pub fn compare_models(artifacts: &[TuningArtifacts]) -> Vec<ModelComparison> {
    let mut rows: Vec<ModelComparison> = artifacts
        .iter()
        .filter_map(|a| {
            a.cv_roc_auc().map(|auc| ModelComparison {
                model: a.model,
                cv_roc_auc: auc,
                best_config: a.best_params.config.clone(),
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        b.cv_roc_auc
            .partial_cmp(&a.cv_roc_auc)
            .unwrap_or(Ordering::Equal)
            .then(a.model.cmp(&b.model))
    });
    rows
}

/// Artifacts of the model with the highest cross-validated ROC-AUC
pub fn select_best(artifacts: &[TuningArtifacts]) -> Result<&TuningArtifacts> {
    let best = compare_models(artifacts)
        .into_iter()
        .next()
        .ok_or_else(|| PunctualityError::ValidationError("no tuned model to select from".to_string()))?;
    artifacts
        .iter()
        .find(|a| a.model == best.model)
        .ok_or_else(|| PunctualityError::ValidationError("selected model has no artifacts".to_string()))
}

/// One test-set prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPrediction {
    /// Row of the modeling table
    pub row: usize,
    pub is_late: bool,
    pub proba_late: f64,
    pub predicted_late: bool,
}

/// Single evaluation of the finalised model on the test partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalEvaluation {
    pub model: ModelKind,
    pub best_params: TrialParams,
    pub best_config: String,
    pub cv_roc_auc: f64,
    pub test: ModelMetrics,
    /// |test ROC-AUC - cross-validated ROC-AUC|
    pub overfit_gap: Option<f64>,
}

/// The finalised workflow with its test-set evaluation
#[derive(Debug, Clone)]
pub struct LastFit {
    pub workflow: FittedWorkflow,
    pub evaluation: FinalEvaluation,
    pub predictions: Vec<TestPrediction>,
}

/// Refit the tuned workflow on every training row and score it once on the test rows
pub fn last_fit(
    artifacts: &TuningArtifacts,
    table: &ModelingTable,
    split: &TrainTestSplit,
    seed: u64,
) -> Result<LastFit> {
    let cv_roc_auc = artifacts.cv_roc_auc().ok_or_else(|| {
        PunctualityError::ValidationError(format!(
            "{} leaderboard does not contain its best configuration",
            artifacts.model.name()
        ))
    })?;

    let workflow = Workflow::new(artifacts.best_spec(seed)?).fit(table, &split.train_indices)?;
    let proba = workflow.predict_proba(table, &split.test_indices)?;
    let labels = table.labels(&split.test_indices);
    let test = ModelMetrics::compute_classification(&labels, &proba, DECISION_THRESHOLD);
    let overfit_gap = test.roc_auc.map(|auc| (auc - cv_roc_auc).abs());

    info!(
        model = artifacts.model.name(),
        cv_roc_auc,
        test_roc_auc = ?test.roc_auc,
        sensitivity = ?test.sensitivity,
        specificity = ?test.specificity,
        "Final fit evaluated"
    );

    let predictions = split
        .test_indices
        .iter()
        .zip(proba.iter())
        .map(|(&row, &p)| TestPrediction {
            row,
            is_late: table.records[row].is_late,
            proba_late: p,
            predicted_late: p > DECISION_THRESHOLD,
        })
        .collect();

    Ok(LastFit {
        workflow,
        evaluation: FinalEvaluation {
            model: artifacts.model,
            best_params: artifacts.best_params.params.clone(),
            best_config: artifacts.best_params.config.clone(),
            cv_roc_auc,
            test,
            overfit_gap,
        },
        predictions,
    })
}
