//! Feature scaling

use crate::error::{PunctualityError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Parameters for one fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,
    scale: f64,
}

/// Z-score scaler over a chosen subset of matrix columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    params: Vec<(usize, ScalerParams)>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit mean and sample standard deviation of each listed column
    pub fn fit(&mut self, x: &Array2<f64>, columns: &[usize]) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(PunctualityError::PreprocessingError(
                "cannot fit scaler on zero rows".to_string(),
            ));
        }

        self.params = columns
            .iter()
            .map(|&j| {
                if j >= x.ncols() {
                    return Err(PunctualityError::ShapeError {
                        expected: format!("column index < {}", x.ncols()),
                        actual: j.to_string(),
                    });
                }
                let col = x.index_axis(Axis(1), j);
                let n = col.len() as f64;
                let mean = col.sum() / n;
                let var = if col.len() > 1 {
                    col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
                } else {
                    0.0
                };
                let std = var.sqrt();
                Ok((j, ScalerParams {
                    center: mean,
                    scale: if std > 0.0 { std } else { 1.0 },
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        self.is_fitted = true;
        Ok(self)
    }

    /// Scale the fitted columns in place
    pub fn transform_inplace(&self, x: &mut Array2<f64>) -> Result<()> {
        if !self.is_fitted {
            return Err(PunctualityError::ModelNotFitted);
        }
        for &(j, p) in &self.params {
            if j >= x.ncols() {
                return Err(PunctualityError::ShapeError {
                    expected: format!("column index < {}", x.ncols()),
                    actual: j.to_string(),
                });
            }
            x.index_axis_mut(Axis(1), j)
                .mapv_inplace(|v| (v - p.center) / p.scale);
        }
        Ok(())
    }

}

impl Default for Scaler {
    fn default() -> Self {
        Self::new()
    }
}
