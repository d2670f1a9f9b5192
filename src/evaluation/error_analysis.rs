//! False-negative analysis on the test partition
//!
//! Compares the arrival delay (delay_in) of late stops the model missed with
//! every other test row, restricted to a window around zero.

use crate::preprocessing::ModelingTable;
use crate::utils::{mean, quantile};
use super::selection::TestPrediction;
use serde::{Deserialize, Serialize};

/// delay_in window inspected, in seconds (both ends inclusive)
pub const DELAY_IN_WINDOW: (f64, f64) = (-100.0, 60.0);

/// Histogram bin width in seconds
pub const HISTOGRAM_BIN_SECS: f64 = 10.0;

/// One histogram bin, `[lower, upper)`; the last bin also holds `upper`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Distribution summary of delay_in for one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelaySummary {
    pub n: usize,
    pub mean: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    /// Share of rows arriving early (delay_in < 0)
    pub share_negative: Option<f64>,
    pub histogram: Vec<HistogramBin>,
}

impl DelaySummary {
    pub fn from_values(values: &[f64]) -> Self {
        let share_negative = if values.is_empty() {
            None
        } else {
            Some(values.iter().filter(|&&v| v < 0.0).count() as f64 / values.len() as f64)
        };
        Self {
            n: values.len(),
            mean: mean(values),
            q1: quantile(values, 0.25),
            median: quantile(values, 0.5),
            q3: quantile(values, 0.75),
            share_negative,
            histogram: histogram(values, DELAY_IN_WINDOW, HISTOGRAM_BIN_SECS),
        }
    }
}

/// Equal-width histogram over `range`; values outside are ignored
pub fn histogram(values: &[f64], range: (f64, f64), width: f64) -> Vec<HistogramBin> {
    let (lo, hi) = range;
    let n_bins = ((hi - lo) / width).ceil().max(1.0) as usize;
    let mut bins: Vec<HistogramBin> = (0..n_bins)
        .map(|i| HistogramBin {
            lower: lo + i as f64 * width,
            upper: (lo + (i + 1) as f64 * width).min(hi),
            count: 0,
        })
        .collect();
    for &v in values {
        if v < lo || v > hi {
            continue;
        }
        let idx = (((v - lo) / width).floor() as usize).min(n_bins - 1);
        bins[idx].count += 1;
    }
    bins
}

/// Missed late stops against the rest of the test partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    pub n_test: usize,
    pub n_false_negatives: usize,
    /// Test rows with delay_in outside the window, not summarised
    pub n_outside_window: usize,
    pub false_negatives: DelaySummary,
    pub others: DelaySummary,
}

fn in_window(v: f64) -> bool {
    v >= DELAY_IN_WINDOW.0 && v <= DELAY_IN_WINDOW.1
}

/// Summarise delay_in for false negatives and for all other test rows
pub fn analyse_false_negatives(table: &ModelingTable, predictions: &[TestPrediction]) -> ErrorAnalysis {
    let mut fn_values = Vec::new();
    let mut other_values = Vec::new();
    let mut n_false_negatives = 0;
    let mut n_outside_window = 0;

    for p in predictions {
        let is_fn = p.is_late && !p.predicted_late;
        if is_fn {
            n_false_negatives += 1;
        }
        let delay_in = table.records[p.row].delay_in;
        if !in_window(delay_in) {
            n_outside_window += 1;
            continue;
        }
        if is_fn {
            fn_values.push(delay_in);
        } else {
            other_values.push(delay_in);
        }
    }

    ErrorAnalysis {
        n_test: predictions.len(),
        n_false_negatives,
        n_outside_window,
        false_negatives: DelaySummary::from_values(&fn_values),
        others: DelaySummary::from_values(&other_values),
    }
}
