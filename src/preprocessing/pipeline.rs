//! Recipes: ordered preprocessing steps that turn modeling rows into a matrix
//!
//! A recipe is fitted on the analysis rows of a resample and then baked on
//! any other rows, so no statistic of the assessment rows leaks into the fit.

use super::encoder::{Encoder, EncoderType};
use super::features::{ModelingRecord, ModelingTable};
use super::scaler::Scaler;
use crate::error::{PunctualityError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Numeric predictors, in matrix order
const NUMERIC_COLUMNS: [&str; 3] = ["delay_in", "planned_dep_hour", "station_stops"];

/// A single preprocessing step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecipeStep {
    /// Replace train type by indicator columns
    Dummy,
    /// Centre and scale every numeric column present at this point
    Normalize,
}

/// Ordered preprocessing steps. With no `Dummy` step the train type enters
/// the matrix as its level code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    steps: Vec<RecipeStep>,
}

impl Recipe {
    /// No preprocessing
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn with_step(mut self, step: RecipeStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[RecipeStep] {
        &self.steps
    }

    fn encoder_type(&self) -> EncoderType {
        if self.steps.contains(&RecipeStep::Dummy) {
            EncoderType::Dummy
        } else {
            EncoderType::Label
        }
    }

    /// Fit the recipe on the given rows
    pub fn fit(&self, table: &ModelingTable, indices: &[usize]) -> Result<FittedRecipe> {
        if indices.is_empty() {
            return Err(PunctualityError::PreprocessingError(
                "cannot fit a recipe on zero rows".to_string(),
            ));
        }

        let encoder = Encoder::new(self.encoder_type());
        let mut fitted = FittedRecipe {
            encoder,
            scaler: None,
            steps: self.steps.clone(),
        };

        let mut dummies_present = false;
        let mut scaled_columns: Vec<usize> = Vec::new();
        for step in &self.steps {
            match step {
                RecipeStep::Dummy => dummies_present = true,
                RecipeStep::Normalize => {
                    let mut columns: Vec<usize> = (0..NUMERIC_COLUMNS.len()).collect();
                    if dummies_present {
                        columns.extend(NUMERIC_COLUMNS.len()..fitted.n_features());
                    }
                    for c in columns {
                        if !scaled_columns.contains(&c) {
                            scaled_columns.push(c);
                        }
                    }
                }
            }
        }

        if !scaled_columns.is_empty() {
            let raw = fitted.raw_matrix(table, indices);
            let mut scaler = Scaler::new();
            scaler.fit(&raw, &scaled_columns)?;
            fitted.scaler = Some(scaler);
        }

        Ok(fitted)
    }
}

/// A recipe with its statistics estimated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedRecipe {
    encoder: Encoder,
    scaler: Option<Scaler>,
    steps: Vec<RecipeStep>,
}

impl FittedRecipe {
    /// Number of matrix columns
    pub fn n_features(&self) -> usize {
        NUMERIC_COLUMNS.len() + self.encoder.width()
    }

    /// Matrix column names
    pub fn feature_names(&self) -> Vec<String> {
        NUMERIC_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(self.encoder.column_names())
            .collect()
    }

    /// Predictor each matrix column derives from
    pub fn feature_groups(&self) -> Vec<&'static str> {
        NUMERIC_COLUMNS
            .iter()
            .copied()
            .chain(std::iter::repeat("train_type").take(self.encoder.width()))
            .collect()
    }

    pub fn steps(&self) -> &[RecipeStep] {
        &self.steps
    }

    fn fill_row(&self, record: &ModelingRecord, row: &mut [f64]) {
        row[0] = record.delay_in;
        row[1] = record.planned_dep_hour as f64;
        row[2] = record.station_stops as f64;
        self.encoder
            .encode_into(record.train_type, &mut row[NUMERIC_COLUMNS.len()..]);
    }

    fn raw_matrix(&self, table: &ModelingTable, indices: &[usize]) -> Array2<f64> {
        let mut x = Array2::zeros((indices.len(), self.n_features()));
        let mut buf = vec![0.0; self.n_features()];
        for (mut row, &i) in x.rows_mut().into_iter().zip(indices) {
            self.fill_row(&table.records[i], &mut buf);
            row.iter_mut().zip(&buf).for_each(|(dst, v)| *dst = *v);
        }
        x
    }

    /// Apply the fitted steps to the given rows
    pub fn bake(&self, table: &ModelingTable, indices: &[usize]) -> Result<Array2<f64>> {
        let mut x = self.raw_matrix(table, indices);
        if let Some(scaler) = &self.scaler {
            scaler.transform_inplace(&mut x)?;
        }
        Ok(x)
    }
}
