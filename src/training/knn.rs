//! K-Nearest Neighbors implementation
//!
//! Weighted kNN classifier: the k nearest training rows vote with kernel
//! weights. Distances are divided by the distance to the (k+1)-th neighbour
//! before the kernel is applied, so every kernel sees values in (0, 1).

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::PI;

use crate::error::{PunctualityError, Result};

const EPS: f64 = 1e-6;

/// Kernel turning standardised distances into vote weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightKernel {
    Rectangular,
    Triangular,
    Epanechnikov,
    Biweight,
    Triweight,
    Cos,
    Inv,
    Gaussian,
    Rank,
    Optimal,
}

impl WeightKernel {
    pub const ALL: [WeightKernel; 10] = [
        WeightKernel::Rectangular,
        WeightKernel::Triangular,
        WeightKernel::Epanechnikov,
        WeightKernel::Biweight,
        WeightKernel::Triweight,
        WeightKernel::Cos,
        WeightKernel::Inv,
        WeightKernel::Gaussian,
        WeightKernel::Rank,
        WeightKernel::Optimal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WeightKernel::Rectangular => "rectangular",
            WeightKernel::Triangular => "triangular",
            WeightKernel::Epanechnikov => "epanechnikov",
            WeightKernel::Biweight => "biweight",
            WeightKernel::Triweight => "triweight",
            WeightKernel::Cos => "cos",
            WeightKernel::Inv => "inv",
            WeightKernel::Gaussian => "gaussian",
            WeightKernel::Rank => "rank",
            WeightKernel::Optimal => "optimal",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == name)
    }

    /// Weights for standardised distances `d` (ascending, each in [EPS, 1 - EPS])
    fn weights(&self, d: &[f64], n_dims: usize) -> Vec<f64> {
        let k = d.len();
        match self {
            WeightKernel::Rectangular => vec![1.0; k],
            WeightKernel::Triangular => d.iter().map(|w| 1.0 - w).collect(),
            WeightKernel::Epanechnikov => d.iter().map(|w| 0.75 * (1.0 - w * w)).collect(),
            // Beta(3,3) and Beta(4,4) densities at (w + 1) / 2
            WeightKernel::Biweight => d
                .iter()
                .map(|w| {
                    let t = (w + 1.0) / 2.0;
                    30.0 * t.powi(2) * (1.0 - t).powi(2)
                })
                .collect(),
            WeightKernel::Triweight => d
                .iter()
                .map(|w| {
                    let t = (w + 1.0) / 2.0;
                    140.0 * t.powi(3) * (1.0 - t).powi(3)
                })
                .collect(),
            WeightKernel::Cos => d.iter().map(|w| (w * PI / 2.0).cos()).collect(),
            WeightKernel::Inv => d.iter().map(|w| 1.0 / w).collect(),
            WeightKernel::Gaussian => {
                let alpha = 1.0 / (2.0 * (k as f64 + 1.0));
                let q = inverse_normal_cdf(alpha).abs();
                d.iter()
                    .map(|w| {
                        let z = w * q;
                        (-0.5 * z * z).exp() / (2.0 * PI).sqrt()
                    })
                    .collect()
            }
            WeightKernel::Rank => {
                let ranks = average_ranks(d);
                ranks.iter().map(|r| (k as f64 + 1.0) - r).collect()
            }
            WeightKernel::Optimal => optimal_weights(k, n_dims.max(1) as f64),
        }
    }
}

/// kNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Minkowski exponent (1 = Manhattan, 2 = Euclidean)
    pub distance_power: f64,
    /// Vote weighting kernel
    pub kernel: WeightKernel,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            distance_power: 2.0,
            kernel: WeightKernel::Optimal,
        }
    }
}

/// K-Nearest Neighbors Classifier for a 0/1 label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Fit the classifier (stores training data)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(PunctualityError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if x.nrows() == 0 || self.config.n_neighbors == 0 {
            return Err(PunctualityError::TrainingError(
                "kNN needs at least one row and one neighbour".to_string(),
            ));
        }
        if self.config.distance_power <= 0.0 {
            return Err(PunctualityError::InvalidParameter {
                name: "distance_power".to_string(),
                value: self.config.distance_power.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Kernel-weighted share of positive neighbours (parallelized over rows)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let x_train = self.x_train.as_ref().ok_or(PunctualityError::ModelNotFitted)?;
        let y_train = self.y_train.as_ref().ok_or(PunctualityError::ModelNotFitted)?;
        if x.ncols() != x_train.ncols() {
            return Err(PunctualityError::ShapeError {
                expected: format!("{} features", x_train.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let probs: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.positive_share(x.row(i), x_train, y_train))
            .collect();

        Ok(Array1::from_vec(probs))
    }

    /// Class predictions at 0.5
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    fn positive_share(&self, point: ArrayView1<f64>, x_train: &Array2<f64>, y_train: &Array1<f64>) -> f64 {
        let k = self.config.n_neighbors.min(x_train.nrows());
        let nearest = find_k_nearest(point, x_train, k + 1, self.config.distance_power);

        // distance to the (k+1)-th neighbour, or the farthest one when too few rows
        let max_dist = nearest
            .get(k)
            .or_else(|| nearest.last())
            .map_or(EPS, |n| n.0)
            .max(EPS);

        let voters = &nearest[..k.min(nearest.len())];
        let standardised: Vec<f64> = voters
            .iter()
            .map(|n| (n.0 / max_dist).clamp(EPS, 1.0 - EPS))
            .collect();
        let weights = self.config.kernel.weights(&standardised, x_train.ncols());

        let mut total = 0.0;
        let mut positive = 0.0;
        for (w, n) in weights.iter().zip(voters) {
            total += w;
            if y_train[n.1] > 0.5 {
                positive += w;
            }
        }
        if total > 0.0 { positive / total } else { 0.0 }
    }
}

/// Max-heap entry for partial sort (keeps k smallest distances)
#[derive(PartialEq)]
struct DistIndex(f64, usize);

impl Eq for DistIndex {}
impl PartialOrd for DistIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// The `k` nearest training rows as (distance, row index), ascending
fn find_k_nearest(point: ArrayView1<f64>, x_train: &Array2<f64>, k: usize, p: f64) -> Vec<DistIndex> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (i, row) in x_train.rows().into_iter().enumerate() {
        let candidate = DistIndex(minkowski(point, row, p), i);
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(top) = heap.peek() {
            if candidate < *top {
                heap.pop();
                heap.push(candidate);
            }
        }
    }

    heap.into_sorted_vec()
}

/// Minkowski distance of order `p`
pub fn minkowski(a: ArrayView1<f64>, b: ArrayView1<f64>, p: f64) -> f64 {
    if p == 2.0 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
    } else if p == 1.0 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
    } else {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs().powf(p))
            .sum::<f64>()
            .powf(1.0 / p)
    }
}

fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = rank;
        }
        start = end + 1;
    }
    ranks
}

/// Samworth's asymptotically optimal weights for `k` neighbours in `d` dimensions
fn optimal_weights(k: usize, d: f64) -> Vec<f64> {
    let kf = k as f64;
    let e = 1.0 + 2.0 / d;
    (1..=k)
        .map(|i| {
            let i = i as f64;
            (1.0 + d / 2.0 - d / (2.0 * kf.powf(2.0 / d)) * (i.powf(e) - (i - 1.0).powf(e))) / kf
        })
        .collect()
}

/// Acklam's rational approximation of the standard normal quantile
fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01, 2.209460984245205e+02, -2.759285104469687e+02,
        1.383577518672690e+02, -3.066479806614716e+01, 2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01, 1.615858368580409e+02, -1.556989798598866e+02,
        6.680131188771972e+01, -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03, -3.223964580411365e-01, -2.400758277161838e+00,
        -2.549732539343734e+00, 4.374664141464968e+00, 2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03, 3.224671290700398e-01, 2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    let p = p.clamp(1e-300, 1.0 - 1e-16);
    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((20, 2), vec![
            // Class 0 (low values)
            1.0, 1.0, 1.5, 1.5, 2.0, 2.0, 2.5, 2.5, 1.0, 2.0,
            1.5, 2.5, 2.0, 1.5, 2.5, 1.0, 1.2, 1.8, 1.8, 1.2,
            // Class 1 (high values)
            8.0, 8.0, 8.5, 8.5, 9.0, 9.0, 9.5, 9.5, 8.0, 9.0,
            8.5, 9.5, 9.0, 8.5, 9.5, 8.0, 8.2, 8.8, 8.8, 8.2,
        ]).unwrap();

        let y = Array1::from_vec(vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
        ]);

        (x, y)
    }

    #[test]
    fn test_every_kernel_separates_clusters() {
        let (x, y) = create_classification_data();
        for kernel in WeightKernel::ALL {
            let mut knn = KNNClassifier::new(KNNConfig {
                n_neighbors: 3,
                distance_power: 1.5,
                kernel,
            });
            knn.fit(&x, &y).unwrap();
            let proba = knn.predict_proba(&array![[1.1, 1.1], [9.1, 9.1]]).unwrap();
            assert!(proba[0] < 0.5, "{:?}", kernel);
            assert!(proba[1] > 0.5, "{:?}", kernel);
        }
    }

    #[test]
    fn test_rectangular_is_plain_vote() {
        let x = array![[0.0], [1.0], [2.0], [10.0]];
        let y = array![1.0, 0.0, 0.0, 1.0];
        let mut knn = KNNClassifier::new(KNNConfig {
            n_neighbors: 3,
            distance_power: 2.0,
            kernel: WeightKernel::Rectangular,
        });
        knn.fit(&x, &y).unwrap();
        let proba = knn.predict_proba(&array![[0.9]]).unwrap();
        assert!((proba[0] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_minkowski_orders() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert!((minkowski(a.view(), b.view(), 2.0) - 5.0).abs() < 1e-12);
        assert!((minkowski(a.view(), b.view(), 1.0) - 7.0).abs() < 1e-12);
        let d15 = minkowski(a.view(), b.view(), 1.5);
        assert!(d15 > 5.0 && d15 < 7.0);
    }

    #[test]
    fn test_optimal_weights_sum_to_one() {
        let w = optimal_weights(7, 6.0);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(w.windows(2).all(|p| p[0] >= p[1]));
    }

    #[test]
    fn test_inverse_normal_cdf() {
        assert!(inverse_normal_cdf(0.5).abs() < 1e-9);
        assert!((inverse_normal_cdf(0.025) + 1.959964).abs() < 1e-5);
    }

    #[test]
    fn test_average_ranks_ties() {
        assert_eq!(average_ranks(&[0.2, 0.1, 0.2]), vec![2.5, 1.0, 2.5]);
    }

    #[test]
    fn test_predict_before_fit() {
        let knn = KNNClassifier::new(KNNConfig::default());
        assert!(knn.predict_proba(&array![[1.0]]).is_err());
    }
}
