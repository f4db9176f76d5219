//! On-disk training artifacts and inference from them.
//!
//! An artifact directory holds:
//!
//! | File | Contents |
//! |------|----------|
//! | `model.bin` | [`FittedModelParams`](crate::model::FittedModelParams), bincode |
//! | `scaler.bin` | standard scaler params, bincode |
//! | `imputer.bin` | imputer params, bincode; absent when rows with missing values were dropped |
//! | `label_encoder.bin` | class names, bincode |
//! | `feature_names.json` | ordered input columns |
//! | `metrics.json` | evaluation report of the saved model |
//!
//! Saving overwrites whatever a previous run left behind.

use crate::dataset::FeatureTable;
use crate::error::{Error, Result};
use crate::model::{argmax, FittedClassifier, FittedModel};
use crate::preprocessing::{
    FittedFeatures, FittedLabelEncoder, FittedSimpleImputer, FittedStandardScaler,
    FittedTransformer,
};
use ndarray::Array2;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MODEL_FILE: &str = "model.bin";
pub const SCALER_FILE: &str = "scaler.bin";
pub const IMPUTER_FILE: &str = "imputer.bin";
pub const LABEL_ENCODER_FILE: &str = "label_encoder.bin";
pub const FEATURE_NAMES_FILE: &str = "feature_names.json";
pub const METRICS_FILE: &str = "metrics.json";

/// Writes the artifacts of one training run into a directory.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Persist a fitted model with its preprocessing and evaluation report.
    pub fn save<R: Serialize>(
        &self,
        model: &FittedModel,
        features: &FittedFeatures,
        label_encoder: &FittedLabelEncoder,
        metrics: &R,
    ) -> Result<()> {
        if model.n_features_in() != features.feature_names().len() {
            return Err(Error::Config(format!(
                "model expects {} features but {} feature names were given",
                model.n_features_in(),
                features.feature_names().len()
            )));
        }
        fs::create_dir_all(&self.dir)?;

        model.save_to_file(self.path(MODEL_FILE))?;
        features.scaler().save_to_file(self.path(SCALER_FILE))?;
        match features.imputer() {
            Some(imputer) => imputer.save_to_file(self.path(IMPUTER_FILE))?,
            None => {
                let stale = self.path(IMPUTER_FILE);
                if stale.exists() {
                    fs::remove_file(stale)?;
                }
            }
        }
        label_encoder.save_to_file(self.path(LABEL_ENCODER_FILE))?;
        fs::write(
            self.path(FEATURE_NAMES_FILE),
            serde_json::to_string_pretty(features.feature_names())?,
        )?;
        fs::write(
            self.path(METRICS_FILE),
            serde_json::to_string_pretty(metrics)?,
        )?;

        info!(dir = %self.dir.display(), kind = %model.kind(), "saved artifacts");
        Ok(())
    }
}

/// A reloaded model with the preprocessing it was trained with.
#[derive(Clone, Debug)]
pub struct Predictor {
    model: FittedModel,
    features: FittedFeatures,
    label_encoder: FittedLabelEncoder,
}

impl Predictor {
    /// Reassemble the artifacts saved by [`ArtifactStore::save`].
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let store = ArtifactStore::new(dir);
        let model = FittedModel::load_from_file(store.path(MODEL_FILE))?;
        let scaler = FittedStandardScaler::load_from_file(store.path(SCALER_FILE))?;
        let imputer_path = store.path(IMPUTER_FILE);
        let imputer = if imputer_path.exists() {
            Some(FittedSimpleImputer::load_from_file(imputer_path)?)
        } else {
            None
        };
        let label_encoder = FittedLabelEncoder::load_from_file(store.path(LABEL_ENCODER_FILE))?;
        let names: Vec<String> =
            serde_json::from_str(&fs::read_to_string(store.path(FEATURE_NAMES_FILE))?)?;

        let features = FittedFeatures::new(names, imputer, scaler)?;
        if model.n_features_in() != features.feature_names().len()
            || model.n_classes() != label_encoder.n_classes()
        {
            return Err(Error::Serialization(format!(
                "artifacts in {} are inconsistent",
                store.dir().display()
            )));
        }
        Ok(Self {
            model,
            features,
            label_encoder,
        })
    }

    pub fn model(&self) -> &FittedModel {
        &self.model
    }

    pub fn classes(&self) -> &[String] {
        self.label_encoder.classes()
    }

    pub fn feature_names(&self) -> &[String] {
        self.features.feature_names()
    }

    /// Class probabilities for each row of `table`, columns ordered as [`Self::classes`].
    pub fn predict_proba(&self, table: &FeatureTable) -> Result<Array2<f64>> {
        let x = self.features.transform_table(table)?;
        Ok(self.model.predict_proba(&x)?)
    }

    /// Predicted class name for each row of `table`.
    pub fn predict(&self, table: &FeatureTable) -> Result<Vec<String>> {
        Ok(self.classify(table)?.labels)
    }

    /// Labels and probabilities from a single pass through the feature transform.
    pub fn classify(&self, table: &FeatureTable) -> Result<Prediction> {
        let proba = self.predict_proba(table)?;
        let codes: Vec<usize> = proba.rows().into_iter().map(|row| argmax(row.iter())).collect();
        let labels = self.label_encoder.inverse_transform(&codes)?;
        Ok(Prediction { labels, proba })
    }
}

/// Output of [`Predictor::classify`].
#[derive(Clone, Debug)]
pub struct Prediction {
    pub labels: Vec<String>,
    /// One row per input row, columns ordered as [`Predictor::classes`].
    pub proba: Array2<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;
    use crate::model::{Classifier, ModelKind, ModelSpec};
    use crate::preprocessing::{LabelEncoder, StandardScaler, Transformer};
    use ndarray::array;

    fn fitted_parts() -> (FittedModel, FittedFeatures, FittedLabelEncoder) {
        let raw = array![[1.0, 10.0], [2.0, 11.0], [8.0, 30.0], [9.0, 31.0]];
        let scaler = StandardScaler::new().fit(&raw).unwrap();
        let x = scaler.transform(&raw).unwrap();
        let (encoder, y) = LabelEncoder::new()
            .fit_transform(&["CANDIDATE", "CANDIDATE", "FALSE POSITIVE", "FALSE POSITIVE"])
            .unwrap();
        let model = ModelSpec::default_for(ModelKind::Svm).fit(&x, &y, 2).unwrap();
        let features = FittedFeatures::new(
            vec!["koi_depth".to_string(), "koi_prad".to_string()],
            None,
            scaler,
        )
        .unwrap();
        (model, features, encoder)
    }

    #[test]
    fn test_save_and_predict() {
        let dir = tempfile::tempdir().unwrap();
        let (model, features, encoder) = fitted_parts();
        let store = ArtifactStore::new(dir.path().join("out"));
        store
            .save(&model, &features, &encoder, &serde_json::json!({"accuracy": 1.0}))
            .unwrap();
        for file in [MODEL_FILE, SCALER_FILE, LABEL_ENCODER_FILE, FEATURE_NAMES_FILE, METRICS_FILE] {
            assert!(store.path(file).exists(), "{file}");
        }
        assert!(!store.path(IMPUTER_FILE).exists());

        let predictor = Predictor::load(store.dir()).unwrap();
        assert_eq!(predictor.feature_names(), features.feature_names());

        // columns are looked up by name, so order in the table does not matter
        let table = FeatureTable::from_columns(vec![
            ("koi_prad", Column::Numeric(vec![10.5, 30.5])),
            ("kepoi_name", Column::Categorical(vec![Some("K00001.01".to_string()), None])),
            ("koi_depth", Column::Numeric(vec![1.5, 8.5])),
        ])
        .unwrap();
        assert_eq!(
            predictor.predict(&table).unwrap(),
            vec!["CANDIDATE".to_string(), "FALSE POSITIVE".to_string()]
        );
        let proba = predictor.predict_proba(&table).unwrap();
        assert_eq!(proba.dim(), (2, 2));

        let prediction = predictor.classify(&table).unwrap();
        assert_eq!(prediction.proba, proba);
        assert_eq!(prediction.labels, predictor.predict(&table).unwrap());
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (model, features, encoder) = fitted_parts();
        ArtifactStore::new(dir.path())
            .save(&model, &features, &encoder, &())
            .unwrap();
        let predictor = Predictor::load(dir.path()).unwrap();

        let table =
            FeatureTable::from_columns(vec![("koi_depth", Column::Numeric(vec![1.0]))]).unwrap();
        let err = predictor.predict(&table).unwrap_err();
        assert!(err.to_string().contains("koi_prad"));
    }

    #[test]
    fn test_load_from_empty_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Predictor::load(dir.path()), Err(Error::Model(_))));
    }
}
