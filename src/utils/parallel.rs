//! Parallel processing utilities

use crate::error::{PunctualityError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the worker pool shared by tuning and the final fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of threads (None = all available cores minus one)
    pub n_threads: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self { n_threads: None }
    }
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(default_worker_count).max(1)
    }

    /// Build a dedicated rayon pool of [`num_threads`](Self::num_threads) workers
    pub fn build_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads())
            .thread_name(|i| format!("punctuality-worker-{}", i))
            .build()
            .map_err(|e| PunctualityError::ThreadPoolError(e.to_string()))
    }
}

/// All available cores minus one, never below one
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}
