//! Crate-level error type.
//!
//! Each layer owns its own error enum ([`DatasetError`], [`PreprocessingError`],
//! [`ModelError`]); this module aggregates them for the end-to-end workflow and
//! the command-line front end.

use crate::dataset::DatasetError;
use crate::model::ModelError;
use crate::preprocessing::PreprocessingError;

/// Error returned by the training workflow, artifact store and CLI.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Loading, writing or reshaping a feature table failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    /// A transformer could not be fitted or applied.
    #[error(transparent)]
    Preprocessing(#[from] PreprocessingError),
    /// A classifier could not be trained or evaluated.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Convenience alias used across the workflow modules.
pub type Result<T> = std::result::Result<T, Error>;
