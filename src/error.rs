//! Error types for ramp

use thiserror::Error;

/// Result type alias for ramp operations
pub type Result<T> = std::result::Result<T, RampError>;

/// Main error type for ramp
#[derive(Error, Debug)]
pub enum RampError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Target unavailable for rows being scored")]
    MissingTarget,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl RampError {
    /// Whether this error means a referenced column does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RampError::FeatureNotFound(_))
    }
}

impl From<polars::error::PolarsError> for RampError {
    fn from(err: polars::error::PolarsError) -> Self {
        match err {
            polars::error::PolarsError::ColumnNotFound(name) => {
                RampError::FeatureNotFound(name.to_string())
            }
            other => RampError::DataError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RampError {
    fn from(err: serde_json::Error) -> Self {
        RampError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for RampError {
    fn from(err: ndarray::ShapeError) -> Self {
        RampError::ShapeError {
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
        let err = RampError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RampError = io_err.into();
        assert!(matches!(err, RampError::IoError(_)));
    }

    #[test]
    fn test_not_found_classification() {
        assert!(RampError::FeatureNotFound("y".into()).is_not_found());
        assert!(!RampError::MissingTarget.is_not_found());
    }
}
