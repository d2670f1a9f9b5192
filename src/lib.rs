//! Punctuality - accrued stop delays on the Belgian rail network
//!
//! Turns one day of Infrabel punctuality data into a binary question per
//! stop: does the train leave later than it arrived? Four model families
//! are tuned on that question and the best one is evaluated on held-out
//! stops.
//!
//! # Modules
//!
//! ## Data
//! - [`utils`] - CSV download and parsing, worker pools, small statistics
//! - [`preprocessing`] - Column extraction, departure repair, features, recipes
//!
//! ## Modeling
//! - [`training`] - Splits, folds, metrics and the four model families
//! - [`optimizer`] - Latin hypercube search and the artifact cache
//! - [`evaluation`] - Model comparison, last fit and error analysis
//! - [`explainability`] - Predictor importance
//!
//! ## Output
//! - [`export`] - Markdown and JSON report
//! - [`pipeline`] - Stage orchestration
//! - [`cli`] - Command-line interface

// Core error handling and configuration
pub mod error;
pub mod config;

// Data
pub mod utils;
pub mod preprocessing;

// Modeling
pub mod training;
pub mod optimizer;
pub mod evaluation;
pub mod explainability;

// Output
pub mod export;
pub mod pipeline;
pub mod cli;

pub use error::{PunctualityError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling and configuration
    pub use crate::error::{PunctualityError, Result};
    pub use crate::config::{OutputConfig, PipelineConfig, SourceConfig, SplitConfig};

    // Data
    pub use crate::utils::{DataLoader, SourceFrames};
    pub use crate::preprocessing::{prepare, ModelingRecord, ModelingTable, PreparedData, Recipe};

    // Modeling
    pub use crate::training::{
        initial_split, CVSplit, CrossValidator, FittedWorkflow, ModelKind, ModelMetrics, ModelSpec,
        RocPoint, TrainTestSplit, Workflow,
    };
    pub use crate::optimizer::{ArtifactCache, OptimizationConfig, SearchSpace, Tuner, TuningArtifacts};
    pub use crate::evaluation::{compare_models, last_fit, select_best, ErrorAnalysis, FinalEvaluation};
    pub use crate::explainability::{predictor_importance, ImportanceResult, PermutationImportance};

    // Output
    pub use crate::export::Report;
    pub use crate::pipeline::{Pipeline, Resamples};
}
