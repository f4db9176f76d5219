//! One type over the three model families, for configuration files, the
//! command line and stored artifacts.

use crate::model::boosting::{
    BoostingParams, FittedGradientBoosting, GradientBoosting, GradientBoostingConfig,
};
use crate::model::error::ModelError;
use crate::model::forest::{FittedRandomForest, ForestParams, RandomForest, RandomForestConfig};
use crate::model::svm::{FittedSvm, Svm, SvmConfig, SvmParams};
use crate::model::{Classifier, FittedClassifier};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Model family selector.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[value(alias = "rf")]
    #[serde(alias = "rf")]
    RandomForest,
    Svm,
    #[value(alias = "xgboost", alias = "gbt")]
    #[serde(alias = "xgboost", alias = "gbt")]
    GradientBoosting,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::RandomForest,
        ModelKind::Svm,
        ModelKind::GradientBoosting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::Svm => "svm",
            ModelKind::GradientBoosting => "gradient_boosting",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model family together with its hyperparameters.
///
/// In YAML the family is given by a `kind` key next to the hyperparameters:
///
/// ```yaml
/// kind: svm
/// c: 10.0
/// kernel: rbf
/// gamma: 0.05
/// ```
///
/// Unknown hyperparameter names are rejected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    RandomForest(RandomForestConfig),
    Svm(SvmConfig),
    GradientBoosting(GradientBoostingConfig),
}

impl Default for ModelSpec {
    fn default() -> Self {
        ModelSpec::RandomForest(RandomForestConfig::default())
    }
}

impl ModelSpec {
    /// Default hyperparameters for a family.
    pub fn default_for(kind: ModelKind) -> Self {
        match kind {
            ModelKind::RandomForest => ModelSpec::RandomForest(RandomForestConfig::default()),
            ModelKind::Svm => ModelSpec::Svm(SvmConfig::default()),
            ModelKind::GradientBoosting => {
                ModelSpec::GradientBoosting(GradientBoostingConfig::default())
            }
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::RandomForest(_) => ModelKind::RandomForest,
            ModelSpec::Svm(_) => ModelKind::Svm,
            ModelSpec::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    /// Override the seed of the randomized families. SVM training is deterministic.
    pub fn with_seed(mut self, seed: u64) -> Self {
        match &mut self {
            ModelSpec::RandomForest(c) => c.seed = seed,
            ModelSpec::GradientBoosting(c) => c.seed = seed,
            ModelSpec::Svm(_) => {}
        }
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            ModelSpec::RandomForest(c) => c.validate(),
            ModelSpec::Svm(c) => c.validate(),
            ModelSpec::GradientBoosting(c) => c.validate(),
        }
    }
}

impl Classifier for ModelSpec {
    type Params = FittedModelParams;
    type Fitted = FittedModel;

    fn fit(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<Self::Fitted, ModelError> {
        Ok(match self {
            ModelSpec::RandomForest(c) => {
                FittedModel::RandomForest(RandomForest::new(c.clone()).fit(x, y, n_classes)?)
            }
            ModelSpec::Svm(c) => FittedModel::Svm(Svm::new(c.clone()).fit(x, y, n_classes)?),
            ModelSpec::GradientBoosting(c) => FittedModel::GradientBoosting(
                GradientBoosting::new(c.clone()).fit(x, y, n_classes)?,
            ),
        })
    }
}

/// Serialized form of a [`FittedModel`]; the variant records the family.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FittedModelParams {
    RandomForest(ForestParams),
    Svm(SvmParams),
    GradientBoosting(BoostingParams),
}

/// A fitted model of any family.
#[derive(Clone, Debug)]
pub enum FittedModel {
    RandomForest(FittedRandomForest),
    Svm(FittedSvm),
    GradientBoosting(FittedGradientBoosting),
}

impl FittedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            FittedModel::RandomForest(_) => ModelKind::RandomForest,
            FittedModel::Svm(_) => ModelKind::Svm,
            FittedModel::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }
}

impl FittedClassifier for FittedModel {
    type Params = FittedModelParams;

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        match self {
            FittedModel::RandomForest(m) => m.predict_proba(x),
            FittedModel::Svm(m) => m.predict_proba(x),
            FittedModel::GradientBoosting(m) => m.predict_proba(x),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ModelError> {
        match self {
            FittedModel::RandomForest(m) => m.predict(x),
            FittedModel::Svm(m) => m.predict(x),
            FittedModel::GradientBoosting(m) => m.predict(x),
        }
    }

    fn n_features_in(&self) -> usize {
        match self {
            FittedModel::RandomForest(m) => m.n_features_in(),
            FittedModel::Svm(m) => m.n_features_in(),
            FittedModel::GradientBoosting(m) => m.n_features_in(),
        }
    }

    fn n_classes(&self) -> usize {
        match self {
            FittedModel::RandomForest(m) => m.n_classes(),
            FittedModel::Svm(m) => m.n_classes(),
            FittedModel::GradientBoosting(m) => m.n_classes(),
        }
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            FittedModel::RandomForest(m) => m.feature_importances(),
            FittedModel::Svm(m) => m.feature_importances(),
            FittedModel::GradientBoosting(m) => m.feature_importances(),
        }
    }

    fn extract_params(&self) -> Self::Params {
        match self {
            FittedModel::RandomForest(m) => FittedModelParams::RandomForest(m.extract_params()),
            FittedModel::Svm(m) => FittedModelParams::Svm(m.extract_params()),
            FittedModel::GradientBoosting(m) => {
                FittedModelParams::GradientBoosting(m.extract_params())
            }
        }
    }

    fn from_params(params: Self::Params) -> Result<Self, ModelError> {
        Ok(match params {
            FittedModelParams::RandomForest(p) => {
                FittedModel::RandomForest(FittedRandomForest::from_params(p)?)
            }
            FittedModelParams::Svm(p) => FittedModel::Svm(FittedSvm::from_params(p)?),
            FittedModelParams::GradientBoosting(p) => {
                FittedModel::GradientBoosting(FittedGradientBoosting::from_params(p)?)
            }
        })
    }
}
