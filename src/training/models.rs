//! Classification metrics and ROC utilities
//!
//! The positive class is "late" (label 1.0). Probabilities are P(late).

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One point of a ROC curve: a row predicts late when P(late) >= threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub specificity: f64,
    pub sensitivity: f64,
}

/// Metrics for model evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// AUC-ROC, `None` when one class is absent
    pub roc_auc: Option<f64>,
    /// True positive rate at the threshold
    pub sensitivity: Option<f64>,
    /// True negative rate at the threshold
    pub specificity: Option<f64>,
    pub accuracy: Option<f64>,
    /// Decision threshold on P(late)
    pub threshold: f64,
    pub n_samples: usize,
    pub n_positive: usize,
}

impl ModelMetrics {
    /// Compute the metrics of predicted probabilities at a threshold
    pub fn compute_classification(y_true: &Array1<f64>, y_prob: &Array1<f64>, threshold: f64) -> Self {
        let y_pred = y_prob.mapv(|p| if p > threshold { 1.0 } else { 0.0 });
        let (tp, fp, tn, fn_) = confusion_counts(y_true, &y_pred);

        let ratio = |num: usize, den: usize| if den > 0 { Some(num as f64 / den as f64) } else { None };

        Self {
            roc_auc: roc_auc(y_true, y_prob),
            sensitivity: ratio(tp, tp + fn_),
            specificity: ratio(tn, tn + fp),
            accuracy: ratio(tp + tn, y_true.len()),
            threshold,
            n_samples: y_true.len(),
            n_positive: tp + fn_,
        }
    }
}

/// (tp, fp, tn, fn) for 0/1 truth and 0/1 predictions
pub fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (usize, usize, usize, usize) {
    let mut counts = (0, 0, 0, 0);
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        match (t > 0.5, p > 0.5) {
            (true, true) => counts.0 += 1,
            (false, true) => counts.1 += 1,
            (false, false) => counts.2 += 1,
            (true, false) => counts.3 += 1,
        }
    }
    counts
}

/// Area under the ROC curve from the rank-sum statistic (ties count half)
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Option<f64> {
    let n = y_true.len().min(scores.len());
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    let mut rank_sum_pos = 0.0;
    let mut n_pos = 0usize;
    let mut start = 0;
    while start < n {
        let mut end = start;
        while end + 1 < n && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        let avg_rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            if y_true[idx] > 0.5 {
                rank_sum_pos += avg_rank;
                n_pos += 1;
            }
        }
        start = end + 1;
    }

    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }
    let u = rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos as f64 * n_neg as f64))
}

/// ROC curve over every distinct score, framed by -inf and +inf thresholds
pub fn roc_curve(y_true: &Array1<f64>, scores: &Array1<f64>) -> Vec<RocPoint> {
    let n = y_true.len().min(scores.len());
    let mut pairs: Vec<(f64, bool)> = (0..n).map(|i| (scores[i], y_true[i] > 0.5)).collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let n_pos = pairs.iter().filter(|p| p.1).count() as f64;
    let n_neg = n as f64 - n_pos;
    let rate = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };

    let mut points = Vec::with_capacity(n + 2);
    points.push(RocPoint {
        threshold: f64::NEG_INFINITY,
        specificity: 0.0,
        sensitivity: 1.0,
    });

    // rows below the current threshold are predicted not late
    let mut pos_below = 0.0;
    let mut neg_below = 0.0;
    let mut i = 0;
    while i < pairs.len() {
        let threshold = pairs[i].0;
        points.push(RocPoint {
            threshold,
            specificity: rate(neg_below, n_neg),
            sensitivity: rate(n_pos - pos_below, n_pos),
        });
        while i < pairs.len() && pairs[i].0 == threshold {
            if pairs[i].1 {
                pos_below += 1.0;
            } else {
                neg_below += 1.0;
            }
            i += 1;
        }
    }

    points.push(RocPoint {
        threshold: f64::INFINITY,
        specificity: 1.0,
        sensitivity: 0.0,
    });
    points
}

/// Trapezoidal area under a ROC curve given as points
pub fn curve_auc(points: &[RocPoint]) -> f64 {
    let mut sorted: Vec<(f64, f64)> = points
        .iter()
        .map(|p| (1.0 - p.specificity, p.sensitivity))
        .collect();
    sorted.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then(a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
    });
    sorted
        .windows(2)
        .map(|w| (w[1].0 - w[0].0) * (w[1].1 + w[0].1) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_auc_perfect_and_inverted() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&y, &array![0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&y, &array![0.9, 0.8, 0.2, 0.1]), Some(0.0));
    }

    #[test]
    fn test_auc_ties_count_half() {
        let y = array![0.0, 1.0];
        assert_eq!(roc_auc(&y, &array![0.5, 0.5]), Some(0.5));
    }

    #[test]
    fn test_auc_single_class() {
        assert_eq!(roc_auc(&array![1.0, 1.0], &array![0.2, 0.3]), None);
    }

    #[test]
    fn test_curve_matches_rank_auc() {
        let y = array![0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let s = array![0.1, 0.4, 0.35, 0.8, 0.35, 0.2, 0.9];
        let points = roc_curve(&y, &s);
        assert_eq!(points.len(), 6 + 2);
        assert_eq!(points[0].sensitivity, 1.0);
        assert_eq!(points.last().unwrap().specificity, 1.0);

        let from_curve = curve_auc(&points);
        let from_ranks = roc_auc(&y, &s).unwrap();
        assert!((from_curve - from_ranks).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_at_threshold() {
        let y = array![1.0, 1.0, 0.0, 0.0];
        let p = array![0.9, 0.3, 0.6, 0.1];
        let m = ModelMetrics::compute_classification(&y, &p, 0.5);
        assert_eq!(m.sensitivity, Some(0.5));
        assert_eq!(m.specificity, Some(0.5));
        assert_eq!(m.n_positive, 2);
    }
}
