//! Error types for session-sentinel

use thiserror::Error;

/// Result type alias for sentinel operations
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Main error type for the classifier pipeline
#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("No training rows: no session has classification == {label}")]
    EmptyTrainingSet { label: String },

    #[error("Training error: {0}")]
    TrainingError(String),

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
}

impl From<polars::error::PolarsError> for SentinelError {
    fn from(err: polars::error::PolarsError) -> Self {
        SentinelError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for SentinelError {
    fn from(err: serde_json::Error) -> Self {
        SentinelError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SentinelError {
    fn from(err: ndarray::ShapeError) -> Self {
        SentinelError::ShapeError {
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
        let err = SentinelError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_missing_columns_display() {
        let err = SentinelError::MissingColumns(vec![
            "total_pages".to_string(),
            "classification".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Missing required columns: total_pages, classification"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SentinelError = io_err.into();
        assert!(matches!(err, SentinelError::IoError(_)));
    }
}
