//! Classifiers.
//!
//! Models use the same unfitted/fitted split as the preprocessing
//! transformers:
//!
//! - a [`Classifier`] holds hyperparameters only and `fit` consumes training
//!   data to produce a [`FittedClassifier`];
//! - a [`FittedClassifier`] holds inference parameters only, predicts, and
//!   round-trips through its plain `Params` struct.
//!
//! There is no "untrained model" state to check at runtime: prediction is
//! only available on fitted types.
//!
//! | Model | Fitted type |
//! |-------|-------------|
//! | [`DecisionTree`] | [`FittedDecisionTree`] |
//! | [`RandomForest`] | [`FittedRandomForest`] |
//! | [`Svm`] | [`FittedSvm`] |
//! | [`GradientBoosting`] | [`FittedGradientBoosting`] |
//!
//! [`ModelSpec`] and [`FittedModel`] wrap the three model families behind one
//! type for configuration files, the command line and stored artifacts.

pub mod boosting;
pub mod error;
pub mod forest;
pub mod kind;
pub mod svm;
pub mod tree;

pub use boosting::{
    BoostingParams, FittedGradientBoosting, GradientBoosting, GradientBoostingConfig,
};
pub use error::ModelError;
pub use forest::{FittedRandomForest, ForestParams, RandomForest, RandomForestConfig};
pub use kind::{FittedModel, FittedModelParams, ModelKind, ModelSpec};
pub use svm::{FittedSvm, Gamma, Kernel, Svm, SvmConfig, SvmParams};
pub use tree::{
    Criterion, DecisionTree, DecisionTreeConfig, FittedDecisionTree, MaxFeatures, TreeParams,
};

use crate::serialization::SerializableParams;
use ndarray::{Array1, Array2};

/// Unfitted classifier holding hyperparameters.
pub trait Classifier: Clone {
    /// Serializable representation of learned parameters.
    type Params: SerializableParams;
    /// The fitted model type ready for inference.
    type Fitted: FittedClassifier<Params = Self::Params>;

    /// Train on `x` (rows are samples) with labels `y` in `0..n_classes`.
    ///
    /// # Errors
    /// Returns [`ModelError`] for empty or non-finite input, mismatched
    /// lengths, out-of-range labels, or invalid hyperparameters.
    fn fit(&self, x: &Array2<f64>, y: &[usize], n_classes: usize)
        -> Result<Self::Fitted, ModelError>;
}

/// Trained classifier ready for inference and serialization.
pub trait FittedClassifier: Clone {
    /// Serializable representation of learned parameters.
    type Params: SerializableParams;

    /// Class probabilities, one row per sample and one column per class.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError>;

    /// Most probable class per sample. Ties go to the lower class code.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ModelError> {
        let proba = self.predict_proba(x)?;
        Ok(proba.rows().into_iter().map(|row| argmax(row.iter())).collect())
    }

    fn n_features_in(&self) -> usize;

    fn n_classes(&self) -> usize;

    /// Normalized feature importances, for models that define them.
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Extract learned parameters as a serializable representation.
    fn extract_params(&self) -> Self::Params;

    /// Reconstruct a fitted model from parameters.
    fn from_params(params: Self::Params) -> Result<Self, ModelError>
    where
        Self: Sized;

    /// Save the fitted model to a file.
    fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> std::io::Result<()> {
        crate::serialization::write_params(&self.extract_params(), path)
    }

    /// Load a fitted model from a file.
    fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ModelError>
    where
        Self: Sized,
    {
        let bytes = std::fs::read(path)?;
        let params = Self::Params::from_bytes(&bytes)
            .map_err(|e| ModelError::Serialization(e.to_string()))?;
        Self::from_params(params)
    }
}

/// Index of the largest value; the first one wins ties.
pub(crate) fn argmax<'a, I: Iterator<Item = &'a f64>>(values: I) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (idx, &v) in values.enumerate() {
        if v > best_value {
            best = idx;
            best_value = v;
        }
    }
    best
}

/// Validate a training set.
pub(crate) fn check_training_data(
    x: &Array2<f64>,
    y: &[usize],
    n_classes: usize,
) -> Result<(), ModelError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ModelError::EmptyData(format!(
            "training matrix has shape {:?}",
            x.dim()
        )));
    }
    if x.nrows() != y.len() {
        return Err(ModelError::ShapeMismatch {
            rows: x.nrows(),
            labels: y.len(),
        });
    }
    if let Some(&label) = y.iter().find(|&&label| label >= n_classes) {
        return Err(ModelError::InvalidLabel { label, n_classes });
    }
    if y.iter().all(|&label| label == y[0]) {
        return Err(ModelError::SingleClass);
    }
    check_finite(x)
}

/// Validate an inference matrix against the fitted width.
pub(crate) fn check_features(x: &Array2<f64>, n_features: usize) -> Result<(), ModelError> {
    if x.ncols() != n_features {
        return Err(ModelError::FeatureMismatch {
            expected: n_features,
            got: x.ncols(),
        });
    }
    check_finite(x)
}

fn check_finite(x: &Array2<f64>) -> Result<(), ModelError> {
    if let Some(((row, col), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(ModelError::NonFinite(format!(
            "value at row {}, column {}",
            row, col
        )));
    }
    Ok(())
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Normalize a non-negative vector to sum to one, leaving all-zero input as is.
pub(crate) fn normalize(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.iter_mut().for_each(|v| *v /= total);
    }
}
