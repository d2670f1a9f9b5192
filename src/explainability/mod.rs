//! Model explainability module
//!
//! Predictor importance of the finalised model: native impurity or gain
//! importance for tree ensembles, permutation importance otherwise.

mod importance;

pub use importance::{
    predictor_importance, ImportanceMethod, ImportanceResult, PermutationImportance, PredictorImportance,
};
