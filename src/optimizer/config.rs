//! Tuning configuration

use serde::{Deserialize, Serialize};
use super::SamplerType;

/// Metric the search maximises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TuningMetric {
    /// Area under the ROC curve
    RocAuc,
}

impl TuningMetric {
    /// Name used in leaderboard files
    pub fn name(&self) -> &'static str {
        match self {
            TuningMetric::RocAuc => "roc_auc",
        }
    }
}

/// Configuration for the space-filling hyperparameter search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Number of candidate configurations per model
    pub n_configs: usize,

    /// Design used to place the candidates
    pub sampler: SamplerType,

    /// Metric to maximise
    pub metric: TuningMetric,

    /// Worker threads (None = all cores minus one)
    pub n_threads: Option<usize>,

    /// Random seed for the design and for model fitting
    pub random_state: u64,

    /// Number of configurations kept in the leaderboard
    pub leaderboard_size: usize,

    /// Log every finished configuration
    pub verbose: bool,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            n_configs: 100,
            sampler: SamplerType::LatinHypercube,
            metric: TuningMetric::RocAuc,
            n_threads: None,
            random_state: 42,
            leaderboard_size: 5,
            verbose: false,
        }
    }
}

impl OptimizationConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set number of configurations
    pub fn with_n_configs(mut self, n: usize) -> Self {
        self.n_configs = n;
        self
    }

    /// Builder method to set the sampler
    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    /// Builder method to set worker threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Builder method to set the seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}
