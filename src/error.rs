//! Error types for the punctuality pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PunctualityError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PunctualityError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Tuning error: {0}")]
    TuningError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cache error in {path}: {reason}")]
    CacheError { path: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

impl From<polars::error::PolarsError> for PunctualityError {
    fn from(err: polars::error::PolarsError) -> Self {
        PunctualityError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PunctualityError {
    fn from(err: serde_json::Error) -> Self {
        PunctualityError::SerializationError(err.to_string())
    }
}

impl From<csv::Error> for PunctualityError {
    fn from(err: csv::Error) -> Self {
        PunctualityError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for PunctualityError {
    fn from(err: reqwest::Error) -> Self {
        PunctualityError::Network(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PunctualityError {
    fn from(err: ndarray::ShapeError) -> Self {
        PunctualityError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PunctualityError::ColumnNotFound("DELAY_DEP".to_string());
        assert_eq!(err.to_string(), "Column not found: DELAY_DEP");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PunctualityError = io_err.into();
        assert!(matches!(err, PunctualityError::IoError(_)));
    }
}
