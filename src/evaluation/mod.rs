//! Model comparison, finalisation and error analysis
//!
//! - ROC overlay of the cross-validated curves and selection by ROC-AUC
//! - Last fit of the winner on the training partition, scored once on test
//! - delay_in distribution of missed late stops

mod selection;
mod error_analysis;

pub use selection::{
    compare_models, last_fit, select_best, FinalEvaluation, LastFit, ModelComparison, TestPrediction,
    DECISION_THRESHOLD,
};
pub use error_analysis::{
    analyse_false_negatives, histogram, DelaySummary, ErrorAnalysis, HistogramBin, DELAY_IN_WINDOW,
    HISTOGRAM_BIN_SECS,
};

use crate::optimizer::TuningArtifacts;
use crate::training::{ModelKind, RocPoint};
use serde::{Deserialize, Serialize};

/// One model's cross-validated ROC curve, resampled on a specificity grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayCurve {
    pub model: ModelKind,
    pub points: Vec<RocPoint>,
}

/// Best sensitivity reachable at or above each specificity of an even grid
/// with `n_steps + 1` points. Thresholds are NaN in the resampled points.
pub fn resample_curve(points: &[RocPoint], n_steps: usize) -> Vec<RocPoint> {
    let n_steps = n_steps.max(1);
    (0..=n_steps)
        .map(|i| {
            let specificity = i as f64 / n_steps as f64;
            let sensitivity = points
                .iter()
                .filter(|p| p.specificity >= specificity - 1e-12)
                .map(|p| p.sensitivity)
                .fold(0.0, f64::max);
            RocPoint {
                threshold: f64::NAN,
                specificity,
                sensitivity,
            }
        })
        .collect()
}

/// Overlay of every model's out-of-fold ROC curve
pub fn roc_overlay(artifacts: &[TuningArtifacts], n_steps: usize) -> Vec<OverlayCurve> {
    artifacts
        .iter()
        .map(|a| OverlayCurve {
            model: a.model,
            points: resample_curve(&a.roc_curve, n_steps),
        })
        .collect()
}
