//! Errors raised while training or applying a classifier.

/// Error type for model training and inference.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// No samples or no features.
    #[error("Empty data: {0}")]
    EmptyData(String),
    /// Number of label entries differs from the number of rows.
    #[error("Shape mismatch: {rows} rows but {labels} labels")]
    ShapeMismatch { rows: usize, labels: usize },
    /// Input width differs from the width seen during fit.
    #[error("Feature mismatch: expected {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },
    /// A label code is not below the declared number of classes.
    #[error("Invalid label {label} for {n_classes} classes")]
    InvalidLabel { label: usize, n_classes: usize },
    /// Fewer than two classes present in the training labels.
    #[error("Training labels contain a single class; at least two are required")]
    SingleClass,
    /// Invalid hyperparameter value.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// NaN or infinite input values.
    #[error("Non-finite input: {0}")]
    NonFinite(String),
    /// Stored parameters are inconsistent or could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for ModelError {
    fn from(err: bincode::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_feature_mismatch() {
        let err = ModelError::FeatureMismatch {
            expected: 12,
            got: 10,
        };
        assert_eq!(err.to_string(), "Feature mismatch: expected 12 features, got 10");
    }

    #[test]
    fn test_error_display_invalid_label() {
        let err = ModelError::InvalidLabel {
            label: 3,
            n_classes: 2,
        };
        assert!(err.to_string().contains("label 3"));
    }

    #[test]
    fn test_error_from_io() {
        let err: ModelError = std::io::Error::new(std::io::ErrorKind::NotFound, "model.bin").into();
        assert!(matches!(err, ModelError::Io(_)));
    }
}
