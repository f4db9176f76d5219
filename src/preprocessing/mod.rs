//! Data preprocessing transformers.
//!
//! Transformers follow a two-state pattern: an unfitted [`Transformer`] holds
//! hyperparameters, and `fit` returns a [`FittedTransformer`] that owns the
//! learned parameters, transforms new data, and round-trips through a plain
//! `Params` struct for serialization.
//!
//! # Available Transformers
//!
//! - [`StandardScaler`]: z-score normalization
//! - [`SimpleImputer`]: fill missing values with mean, median, most frequent, or constant
//! - [`LabelEncoder`]: string class labels to integer codes
//!
//! [`Preprocessor`] chains column selection, missing-value handling, the
//! train/test split and the transformers above for a KOI feature table.
//!
//! # Example
//!
//! ```no_run
//! use koi_classifier::dataset::load_csv;
//! use koi_classifier::preprocessing::{PreprocessConfig, Preprocessor};
//!
//! let loaded = load_csv("KOI Selected Data.csv").unwrap();
//! let prepared = Preprocessor::new(PreprocessConfig::default())
//!     .prepare(&loaded.table)
//!     .unwrap();
//! println!("{} training rows", prepared.x_train.nrows());
//! ```

pub mod encoding;
pub mod error;
pub mod features;
pub mod imputation;
pub mod scaling;
pub mod traits;

pub use encoding::{FittedLabelEncoder, LabelEncoder, LabelEncoderParams};
pub use error::PreprocessingError;
pub use features::{
    feature_matrix, FittedFeatures, MissingStrategy, PreparedData, PreprocessConfig, Preprocessor,
    DEFAULT_DROP_COLUMNS,
};
pub use imputation::{FittedSimpleImputer, ImputeStrategy, SimpleImputer, SimpleImputerParams};
pub use scaling::{
    FittedStandardScaler, StandardScaler, StandardScalerConfig, StandardScalerParams,
};
pub use traits::{FittedTransformer, Transformer};
