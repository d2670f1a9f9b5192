//! Pipeline configuration
//!
//! Every stage reads its settings from [`PipelineConfig`]. Values come from
//! `Default`, optionally a JSON file, and finally CLI overrides.

use crate::error::{PunctualityError, Result};
use crate::optimizer::OptimizationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Raw punctuality export published by Infrabel (one day, semicolon separated)
pub const DEFAULT_SOURCE_URL: &str =
    "https://opendata.infrabel.be/api/explore/v2.1/catalog/datasets/ruwe-gegevens-van-stiptheid-d-1/exports/csv?delimiter=%3B";

/// Where the raw data comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Remote CSV location
    pub url: String,
    /// Local file used instead of the URL when set
    pub input: Option<PathBuf>,
    /// HTTP timeout
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            input: None,
            timeout_secs: 120,
        }
    }
}

/// Train/test split and resampling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Share of each label class that goes to the training partition
    pub train_fraction: f64,
    /// Number of cross-validation folds over the training partition
    pub n_folds: usize,
    /// Seed for the split and the fold assignment
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.75,
            n_folds: 10,
            seed: 42,
        }
    }
}

/// Output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory holding the per-model tuning artifacts
    pub cache_dir: PathBuf,
    /// Directory receiving report.md and report.json
    pub output_dir: PathBuf,
    /// Ignore cached tuning artifacts and search again
    pub force_retune: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("tuning_cache"),
            output_dir: PathBuf::from("report"),
            force_retune: false,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub split: SplitConfig,
    pub tuning: OptimizationConfig,
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read from a local file instead of the remote URL
    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.source.input = Some(path.into());
        self
    }

    /// Set the remote URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.source.url = url.into();
        self
    }

    /// Set the seed used for splitting, resampling and tuning
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.split.seed = seed;
        self.tuning.random_state = seed;
        self
    }

    /// Set the number of cross-validation folds
    pub fn with_folds(mut self, n_folds: usize) -> Self {
        self.split.n_folds = n_folds;
        self
    }

    /// Set the number of candidate configurations per model
    pub fn with_n_configs(mut self, n_configs: usize) -> Self {
        self.tuning.n_configs = n_configs;
        self
    }

    /// Set the tuning cache directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output.cache_dir = dir.into();
        self
    }

    /// Set the report directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output.output_dir = dir.into();
        self
    }

    /// Force a fresh search even when cached artifacts exist
    pub fn with_force_retune(mut self, force: bool) -> Self {
        self.output.force_retune = force;
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let fraction = self.split.train_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(PunctualityError::InvalidParameter {
                name: "split.train_fraction".to_string(),
                value: fraction.to_string(),
                reason: "must lie strictly between 0 and 1".to_string(),
            });
        }
        if self.split.n_folds < 2 {
            return Err(PunctualityError::InvalidParameter {
                name: "split.n_folds".to_string(),
                value: self.split.n_folds.to_string(),
                reason: "at least 2 folds are needed".to_string(),
            });
        }
        if self.tuning.n_configs == 0 {
            return Err(PunctualityError::InvalidParameter {
                name: "tuning.n_configs".to_string(),
                value: "0".to_string(),
                reason: "at least one configuration must be evaluated".to_string(),
            });
        }
        if self.source.input.is_none() {
            let parsed = url::Url::parse(&self.source.url)
                .map_err(|e| PunctualityError::ConfigError(format!("Invalid URL: {}", e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(PunctualityError::ConfigError(format!(
                    "Unsupported URL scheme: '{}'",
                    parsed.scheme()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.split.n_folds, 10);
        assert_eq!(config.tuning.n_configs, 100);
        assert!((config.split.train_fraction - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_fraction() {
        let mut config = PipelineConfig::default();
        config.split.train_fraction = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_http_url() {
        let config = PipelineConfig::default().with_url("ftp://example.org/data.csv");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_overrides() {
        let config = PipelineConfig::default().with_seed(7).with_n_configs(12);
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.split.seed, 7);
        assert_eq!(back.tuning.random_state, 7);
        assert_eq!(back.tuning.n_configs, 12);
    }
}
