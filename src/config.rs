//! YAML training configuration.
//!
//! Every field has a default, so a config file only lists what it changes:
//!
//! ```yaml
//! data: "KOI Selected 2000 Signals.csv"
//! output_dir: artifacts/svm
//! preprocess:
//!   missing: drop_rows
//!   test_size: 0.25
//! model:
//!   kind: svm
//!   c: 10.0
//! ```

use crate::error::{Error, Result};
use crate::model::ModelSpec;
use crate::preprocessing::PreprocessConfig;
use crate::search::SearchConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Labelled KOI feature CSV.
    pub data: PathBuf,
    /// Artifact directory, overwritten on every run.
    pub output_dir: PathBuf,
    pub preprocess: PreprocessConfig,
    pub model: ModelSpec,
    /// When set, `model` is replaced by the best candidate of a cross-validated search.
    pub search: Option<SearchConfig>,
    /// Number of features listed in the text report.
    pub top_features: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data: PathBuf::from("KOI Selected 2000 Signals.csv"),
            output_dir: PathBuf::from("artifacts"),
            preprocess: PreprocessConfig::default(),
            model: ModelSpec::default(),
            search: None,
            top_features: 10,
        }
    }
}

impl TrainingConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: TrainingConfig = serde_yaml::from_str(text)
            .map_err(|e| Error::Config(format!("failed to parse YAML config: {e}")))?;
        Ok(config)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.preprocess
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        self.model
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        if let Some(search) = &self.search {
            search.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Criterion, Gamma, GradientBoostingConfig, Kernel, MaxFeatures, ModelKind,
        RandomForestConfig, SvmConfig,
    };
    use crate::preprocessing::MissingStrategy;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = TrainingConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, TrainingConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
data: koi.csv
output_dir: out/svm
preprocess:
  missing: drop_rows
  test_size: 0.25
model:
  kind: svm
  c: 10.0
  kernel: linear
search:
  n_folds: 3
  scoring: macro_f1
  candidates:
    - kind: random_forest
      n_estimators: 50
    - kind: gradient_boosting
      learning_rate: 0.1
"#;
        let config = TrainingConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.data, PathBuf::from("koi.csv"));
        assert_eq!(config.preprocess.missing, MissingStrategy::DropRows);
        assert_eq!(config.preprocess.target_column, "koi_disposition");
        match &config.model {
            ModelSpec::Svm(svm) => {
                assert_eq!(svm.c, 10.0);
                assert_eq!(svm.kernel, Kernel::Linear);
            }
            other => panic!("unexpected model {other:?}"),
        }
        let search = config.search.as_ref().unwrap();
        assert_eq!(search.candidates.len(), 2);
        assert_eq!(search.candidates[1].kind(), ModelKind::GradientBoosting);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_test_size() {
        let mut config = TrainingConfig::default();
        config.preprocess.test_size = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(matches!(
            TrainingConfig::from_yaml_str("epochs: 3\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_yaml_round_trip_every_family() {
        let models = [
            ModelSpec::RandomForest(RandomForestConfig {
                max_features: MaxFeatures::Fraction(0.5),
                criterion: Criterion::Entropy,
                max_depth: Some(8),
                ..Default::default()
            }),
            ModelSpec::Svm(SvmConfig {
                gamma: Gamma::Value(0.1),
                kernel: Kernel::Linear,
                ..Default::default()
            }),
            ModelSpec::GradientBoosting(GradientBoostingConfig {
                subsample: 0.8,
                ..Default::default()
            }),
        ];
        for model in models {
            let config = TrainingConfig {
                model: model.clone(),
                preprocess: PreprocessConfig {
                    missing: MissingStrategy::Constant(-1.0),
                    ..Default::default()
                },
                search: Some(SearchConfig {
                    candidates: vec![model.clone(), ModelSpec::default()],
                    ..Default::default()
                }),
                ..Default::default()
            };
            let yaml = config.to_yaml().unwrap();
            let reloaded = TrainingConfig::from_yaml_str(&yaml)
                .unwrap_or_else(|e| panic!("{} did not reload: {e}\n{yaml}", model.kind()));
            assert_eq!(reloaded, config);
        }
    }

    #[test]
    fn test_scalar_gamma_and_max_features() {
        let yaml = r#"
model:
  kind: svm
  gamma: 0.25
search:
  candidates:
    - kind: svm
      gamma: auto
    - kind: rf
      max_features: 0.3
    - kind: random_forest
      max_features: log2
"#;
        let config = TrainingConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(
            config.model,
            ModelSpec::Svm(SvmConfig {
                gamma: Gamma::Value(0.25),
                ..Default::default()
            })
        );
        let candidates = &config.search.as_ref().unwrap().candidates;
        match (&candidates[0], &candidates[1], &candidates[2]) {
            (ModelSpec::Svm(svm), ModelSpec::RandomForest(a), ModelSpec::RandomForest(b)) => {
                assert_eq!(svm.gamma, Gamma::Auto);
                assert_eq!(a.max_features, MaxFeatures::Fraction(0.3));
                assert_eq!(b.max_features, MaxFeatures::Log2);
            }
            other => panic!("unexpected candidates {other:?}"),
        }
    }

    #[test]
    fn test_bad_hyperparameters_are_rejected() {
        // misspelled field
        assert!(TrainingConfig::from_yaml_str("model:\n  kind: svm\n  gama: 0.1\n").is_err());
        assert!(TrainingConfig::from_yaml_str("model:\n  kind: svm\n  gamma: wide\n").is_err());
        let config = TrainingConfig::from_yaml_str("model:\n  kind: gbt\n").unwrap();
        assert_eq!(config.model.kind(), ModelKind::GradientBoosting);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TrainingConfig::from_yaml_file(dir.path().join("nope.yaml")).unwrap_err();
        assert!(err.to_string().contains("nope.yaml"));
    }
}
