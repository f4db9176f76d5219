//! Error types for preprocessing operations.

/// Error type for preprocessing operations.
#[derive(Debug, thiserror::Error)]
pub enum PreprocessingError {
    /// Shape mismatch between expected and actual matrix dimensions.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape { expected: String, got: String },
    /// Numerical computation error (overflow, non-finite statistics).
    #[error("Numerical error: {0}")]
    NumericalError(String),
    /// Data contains missing values (NaN) when not expected.
    #[error("Missing values: {0}")]
    MissingValues(String),
    /// Invalid hyperparameter value.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    IoError(String),
    /// Empty data provided where non-empty was required.
    #[error("Empty data: {0}")]
    EmptyData(String),
    /// Feature dimension mismatch.
    #[error("Feature mismatch: expected {expected_features} features, got {got_features}")]
    FeatureMismatch {
        expected_features: usize,
        got_features: usize,
    },
    /// Label not seen while fitting the encoder.
    #[error("Unknown label: {0:?}")]
    UnknownLabel(String),
    /// Target or feature column missing from the input table.
    #[error("Missing column: {0}")]
    MissingColumn(String),
}

impl From<std::io::Error> for PreprocessingError {
    fn from(err: std::io::Error) -> Self {
        PreprocessingError::IoError(err.to_string())
    }
}

impl From<bincode::Error> for PreprocessingError {
    fn from(err: bincode::Error) -> Self {
        PreprocessingError::SerializationError(err.to_string())
    }
}

impl From<crate::dataset::DatasetError> for PreprocessingError {
    fn from(err: crate::dataset::DatasetError) -> Self {
        match err {
            crate::dataset::DatasetError::UnknownColumn(name) => {
                PreprocessingError::MissingColumn(name)
            }
            other => PreprocessingError::InvalidParameter(other.to_string()),
        }
    }
}
