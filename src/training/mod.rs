//! Model training module
//!
//! Provides the four classifier families compared by the pipeline:
//! - Random forest (probability trees on bootstrap samples)
//! - Gradient boosting on histogram-binned features
//! - K-Nearest Neighbors with kernel-weighted votes
//! - Neural network (single hidden layer MLP)
//!
//! plus the workflow layer that binds each to its recipe, the train/test
//! split and cross-validation folds, and ROC metrics.

mod config;
mod engine;
mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod random_forest;
pub mod gradient_boosting;
pub mod knn;
pub mod neural_network;

pub use config::{ModelKind, ModelSpec};
pub use engine::{FittedWorkflow, TrainedModel, Workflow};
pub use models::{confusion_counts, curve_auc, roc_auc, roc_curve, ModelMetrics, RocPoint};
pub use cross_validation::{initial_split, resolve_splits, CVSplit, CVStrategy, CrossValidator, TrainTestSplit};
pub use decision_tree::{DecisionTree, TreeNode};
pub use random_forest::{MaxFeatures, RandomForest};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use knn::{KNNClassifier, KNNConfig, WeightKernel};
pub use neural_network::{MLPClassifier, MLPConfig};
