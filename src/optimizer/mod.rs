//! Hyperparameter search
//!
//! Provides:
//! - Search spaces over float, log-scale, integer and categorical parameters
//! - Latin hypercube and random candidate designs
//! - A grid tuner scoring every candidate by cross-validated ROC-AUC
//! - CSV persistence of the tuning artifacts

mod config;
mod search_space;
mod optimizer;
mod samplers;
pub mod cache;

pub use config::{OptimizationConfig, TuningMetric};
pub use search_space::{Parameter, ParameterType, ParameterValue, SearchSpace, TrialParams};
pub use optimizer::{config_label, BestParams, LeaderboardEntry, Tuner, TuningArtifacts};
pub use samplers::{create_sampler, LatinHypercubeSampler, RandomSampler, Sampler, SamplerType};
pub use cache::{ArtifactCache, TuningFingerprint};
