//! Model families, their recipes, search spaces and hyperparameter mapping

use crate::error::{PunctualityError, Result};
use crate::optimizer::{SearchSpace, TrialParams};
use crate::preprocessing::{Recipe, RecipeStep};
use super::gradient_boosting::GradientBoostingConfig;
use super::knn::{KNNConfig, WeightKernel};
use super::neural_network::MLPConfig;
use super::random_forest::MaxFeatures;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four model families compared by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    RandomForest,
    XGBoost,
    Knn,
    NeuralNet,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::RandomForest,
        ModelKind::XGBoost,
        ModelKind::Knn,
        ModelKind::NeuralNet,
    ];

    /// Short name, used for cache file prefixes and the CLI
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "rf",
            ModelKind::XGBoost => "xgb",
            ModelKind::Knn => "knn",
            ModelKind::NeuralNet => "nnet",
        }
    }

    /// Human readable name
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "Random forest",
            ModelKind::XGBoost => "Gradient boosting",
            ModelKind::Knn => "k-nearest neighbours",
            ModelKind::NeuralNet => "Neural network",
        }
    }

    /// Preprocessing applied before this model
    pub fn recipe(&self) -> Recipe {
        match self {
            ModelKind::RandomForest => Recipe::new(),
            ModelKind::XGBoost => Recipe::new().with_step(RecipeStep::Dummy),
            ModelKind::Knn => Recipe::new()
                .with_step(RecipeStep::Dummy)
                .with_step(RecipeStep::Normalize),
            ModelKind::NeuralNet => Recipe::new()
                .with_step(RecipeStep::Normalize)
                .with_step(RecipeStep::Dummy),
        }
    }

    /// Tuned hyperparameters and their ranges
    pub fn search_space(&self) -> SearchSpace {
        match self {
            ModelKind::RandomForest => SearchSpace::new()
                .int("mtry", 1, 4)
                .int("trees", 1, 2000)
                .int("min_n", 2, 40),
            ModelKind::XGBoost => SearchSpace::new()
                .int("trees", 1, 2000)
                .int("min_n", 2, 40)
                .int("tree_depth", 1, 15)
                .log10_float("learn_rate", -10.0, -1.0)
                .log10_float("loss_reduction", -10.0, 1.5)
                .float("sample_size", 0.1, 1.0),
            ModelKind::Knn => SearchSpace::new()
                .int("neighbors", 1, 15)
                .categorical(
                    "weight_func",
                    &WeightKernel::ALL.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
                )
                .float("dist_power", 1.0, 2.0),
            ModelKind::NeuralNet => SearchSpace::new()
                .int("hidden_units", 1, 10)
                .log10_float("penalty", -10.0, 0.0)
                .int("epochs", 10, 1000),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = PunctualityError;

    fn from_str(s: &str) -> Result<Self> {
        ModelKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s.trim().to_lowercase())
            .ok_or_else(|| PunctualityError::ConfigError(format!(
                "Unknown model '{}', expected one of rf, xgb, knn, nnet",
                s
            )))
    }
}

/// A model family with concrete hyperparameters, ready to fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelSpec {
    RandomForest {
        trees: usize,
        min_n: usize,
        mtry: MaxFeatures,
        seed: u64,
    },
    XGBoost(GradientBoostingConfig),
    Knn(KNNConfig),
    NeuralNet(MLPConfig),
}

fn int_param(params: &TrialParams, name: &str) -> Result<i64> {
    params
        .get(name)
        .and_then(|v| v.as_int())
        .ok_or_else(|| missing(name))
}

fn float_param(params: &TrialParams, name: &str) -> Result<f64> {
    params
        .get(name)
        .and_then(|v| v.as_float())
        .ok_or_else(|| missing(name))
}

fn missing(name: &str) -> PunctualityError {
    PunctualityError::InvalidParameter {
        name: name.to_string(),
        value: "<missing>".to_string(),
        reason: "required by the model".to_string(),
    }
}

fn positive(name: &str, value: i64) -> Result<usize> {
    if value < 1 {
        return Err(PunctualityError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value as usize)
}

impl ModelSpec {
    /// Build the model specification for one sampled configuration
    pub fn from_params(kind: ModelKind, params: &TrialParams, seed: u64) -> Result<Self> {
        match kind {
            ModelKind::RandomForest => Ok(ModelSpec::RandomForest {
                trees: positive("trees", int_param(params, "trees")?)?,
                min_n: positive("min_n", int_param(params, "min_n")?)?,
                mtry: MaxFeatures::Fixed(positive("mtry", int_param(params, "mtry")?)?),
                seed,
            }),
            ModelKind::XGBoost => Ok(ModelSpec::XGBoost(GradientBoostingConfig {
                n_estimators: positive("trees", int_param(params, "trees")?)?,
                learning_rate: float_param(params, "learn_rate")?,
                max_depth: positive("tree_depth", int_param(params, "tree_depth")?)?,
                min_child_weight: int_param(params, "min_n")? as f64,
                gamma: float_param(params, "loss_reduction")?,
                subsample: float_param(params, "sample_size")?,
                random_state: Some(seed),
                ..Default::default()
            })),
            ModelKind::Knn => {
                let name = params
                    .get("weight_func")
                    .and_then(|v| v.as_string())
                    .ok_or_else(|| missing("weight_func"))?;
                let kernel = WeightKernel::parse(name).ok_or_else(|| PunctualityError::InvalidParameter {
                    name: "weight_func".to_string(),
                    value: name.to_string(),
                    reason: "unknown kernel".to_string(),
                })?;
                Ok(ModelSpec::Knn(KNNConfig {
                    n_neighbors: positive("neighbors", int_param(params, "neighbors")?)?,
                    distance_power: float_param(params, "dist_power")?,
                    kernel,
                }))
            }
            ModelKind::NeuralNet => Ok(ModelSpec::NeuralNet(MLPConfig {
                hidden_units: positive("hidden_units", int_param(params, "hidden_units")?)?,
                max_epochs: positive("epochs", int_param(params, "epochs")?)?,
                penalty: float_param(params, "penalty")?,
                random_state: seed,
                ..Default::default()
            })),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::RandomForest { .. } => ModelKind::RandomForest,
            ModelSpec::XGBoost(_) => ModelKind::XGBoost,
            ModelSpec::Knn(_) => ModelKind::Knn,
            ModelSpec::NeuralNet(_) => ModelKind::NeuralNet,
        }
    }
}
