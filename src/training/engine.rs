//! Workflows: a recipe bundled with a model specification

use crate::error::Result;
use crate::preprocessing::{FittedRecipe, ModelingTable, Recipe};
use super::config::{ModelKind, ModelSpec};
use super::gradient_boosting::GradientBoostingClassifier;
use super::knn::KNNClassifier;
use super::neural_network::MLPClassifier;
use super::random_forest::RandomForest;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    RandomForest(RandomForest),
    XGBoost(GradientBoostingClassifier),
    Knn(KNNClassifier),
    NeuralNet(MLPClassifier),
}

impl TrainedModel {
    /// Fit the model described by `spec` on a baked matrix
    pub fn fit(spec: &ModelSpec, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        match spec {
            ModelSpec::RandomForest { trees, min_n, mtry, seed } => {
                let mut model = RandomForest::new(*trees)
                    .with_min_samples_split(*min_n)
                    .with_max_features(*mtry)
                    .with_random_state(*seed);
                model.fit(x, y)?;
                Ok(TrainedModel::RandomForest(model))
            }
            ModelSpec::XGBoost(config) => {
                let mut model = GradientBoostingClassifier::new(config.clone());
                model.fit(x, y)?;
                Ok(TrainedModel::XGBoost(model))
            }
            ModelSpec::Knn(config) => {
                let mut model = KNNClassifier::new(config.clone());
                model.fit(x, y)?;
                Ok(TrainedModel::Knn(model))
            }
            ModelSpec::NeuralNet(config) => {
                let mut model = MLPClassifier::new(config.clone());
                model.fit(x, y)?;
                Ok(TrainedModel::NeuralNet(model))
            }
        }
    }

    /// P(late) per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::RandomForest(m) => m.predict_proba(x),
            TrainedModel::XGBoost(m) => m.predict_proba(x),
            TrainedModel::Knn(m) => m.predict_proba(x),
            TrainedModel::NeuralNet(m) => m.predict_proba(x),
        }
    }

    /// Impurity or gain importance per matrix column, for tree models only
    pub fn native_importances(&self) -> Option<Array1<f64>> {
        match self {
            TrainedModel::RandomForest(m) => m.feature_importances().cloned(),
            TrainedModel::XGBoost(m) => m.feature_importances(),
            TrainedModel::Knn(_) | TrainedModel::NeuralNet(_) => None,
        }
    }
}

/// Recipe plus model specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    recipe: Recipe,
    spec: ModelSpec,
}

impl Workflow {
    /// Pair a model specification with its family's default recipe
    pub fn new(spec: ModelSpec) -> Self {
        Self {
            recipe: spec.kind().recipe(),
            spec,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.spec.kind()
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    /// Fit the recipe and then the model on the given table rows
    pub fn fit(&self, table: &ModelingTable, rows: &[usize]) -> Result<FittedWorkflow> {
        let recipe = self.recipe.fit(table, rows)?;
        let x = recipe.bake(table, rows)?;
        let y = table.labels(rows);
        debug!(
            model = self.kind().name(),
            rows = rows.len(),
            columns = ?recipe.feature_names(),
            "Fitting workflow"
        );
        let model = TrainedModel::fit(&self.spec, &x, &y)?;
        Ok(FittedWorkflow {
            kind: self.kind(),
            recipe,
            model,
        })
    }
}

/// A workflow fitted on a set of rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedWorkflow {
    kind: ModelKind,
    recipe: FittedRecipe,
    model: TrainedModel,
}

impl FittedWorkflow {
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn recipe(&self) -> &FittedRecipe {
        &self.recipe
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Bake the rows with the fitted recipe
    pub fn bake(&self, table: &ModelingTable, rows: &[usize]) -> Result<Array2<f64>> {
        self.recipe.bake(table, rows)
    }

    /// P(late) for the given table rows
    pub fn predict_proba(&self, table: &ModelingTable, rows: &[usize]) -> Result<Array1<f64>> {
        let x = self.bake(table, rows)?;
        self.model.predict_proba(&x)
    }

    /// P(late) for an already baked matrix
    pub fn predict_proba_baked(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model.predict_proba(x)
    }

    /// Native importance summed per predictor, so dummy columns fold back
    /// into the train type, then scaled to sum to 1. Predictors come in
    /// their first-seen column order.
    pub fn native_importance(&self) -> Option<Vec<(String, f64)>> {
        let per_column = self.model.native_importances()?;
        let mut grouped: Vec<(String, f64)> = Vec::new();
        for (group, value) in self.recipe.feature_groups().into_iter().zip(per_column.iter()) {
            match grouped.iter_mut().find(|(name, _)| name.as_str() == group) {
                Some(entry) => entry.1 += value,
                None => grouped.push((group.to_string(), *value)),
            }
        }
        let total: f64 = grouped.iter().map(|(_, v)| v).sum();
        if total > 0.0 {
            for entry in grouped.iter_mut() {
                entry.1 /= total;
            }
        }
        Some(grouped)
    }
}
