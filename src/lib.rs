//! # koi-classifier
//!
//! Classification of Kepler Objects of Interest (exoplanet candidates) from
//! tabular lightcurve-derived features.
//!
//! ## Core Design Principles
//!
//! - **Fitted/unfitted split**: transformers and classifiers hold
//!   hyperparameters until `fit` returns a separate fitted type that holds
//!   only what inference needs. Predicting with an untrained model does not
//!   type-check.
//! - **Plain parameters**: every fitted type round-trips through a serde
//!   `Params` struct, which is what gets written to disk.
//! - **Fit on train only**: imputation and scaling statistics come from the
//!   training split and are reused unchanged for the test split and for
//!   inference.
//!
//! ## Workflow
//!
//! ```text
//! CSV ──load──▶ FeatureTable ──Preprocessor──▶ (x_train, x_test, y_train, y_test)
//!                                                  │
//!                       ModelSpec::fit ◀───────────┘
//!                            │
//!                 evaluate ──┴── ArtifactStore::save ──▶ Predictor::load
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use koi_classifier::config::TrainingConfig;
//! use koi_classifier::model::{ModelKind, ModelSpec};
//! use koi_classifier::pipeline;
//!
//! let config = TrainingConfig {
//!     data: "KOI Selected 2000 Signals.csv".into(),
//!     model: ModelSpec::default_for(ModelKind::GradientBoosting),
//!     ..Default::default()
//! };
//! let report = pipeline::train(&config).unwrap();
//! println!("{}", report.render(10));
//! ```
//!
//! ## Modules
//!
//! - [`dataset`]: feature tables, CSV I/O, splits and folds
//! - [`disposition`]: mission label standardization
//! - [`selection`]: balanced high-SNR signal selection
//! - [`explore`]: column summaries
//! - [`preprocessing`]: imputer, scaler, label encoder, feature preparation
//! - [`model`]: random forest, SVM, gradient boosting
//! - [`metrics`]: confusion matrix, per-class scores, ROC
//! - [`search`]: cross-validated grid search
//! - [`artifacts`]: on-disk artifacts and [`Predictor`](artifacts::Predictor)
//! - [`pipeline`]: train / compare workflows and file tasks
//! - [`config`]: YAML configuration
//! - [`cli`]: the `koi` command line

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod disposition;
pub mod error;
pub mod explore;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod preprocessing;
pub mod search;
pub mod selection;
pub mod serialization;

pub use error::{Error, Result};
