//! From a raw [`FeatureTable`] to standardized train/test matrices.
//!
//! [`Preprocessor::prepare`] performs, in order:
//!
//! 1. drop rows whose target label is missing;
//! 2. drop configured columns (identifiers, leaking scores) and every
//!    categorical column other than the target;
//! 3. drop feature columns whose missing fraction exceeds
//!    `max_missing_fraction`;
//! 4. handle the remaining missing cells (drop rows, or impute later);
//! 5. encode labels and split train/test (stratified by default);
//! 6. fit the imputer and scaler on the training split only and apply them to
//!    both splits.
//!
//! The fitted pieces are returned as a [`FittedFeatures`] so that new tables
//! can go through exactly the same column selection and transforms.

use crate::dataset::{train_test_split, Column, FeatureTable, DEFAULT_SEED, DEFAULT_TEST_SIZE};
use crate::preprocessing::encoding::{FittedLabelEncoder, LabelEncoder};
use crate::preprocessing::error::PreprocessingError;
use crate::preprocessing::imputation::{FittedSimpleImputer, ImputeStrategy, SimpleImputer};
use crate::preprocessing::scaling::{FittedStandardScaler, StandardScaler};
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Columns that identify a KOI or leak its vetting outcome.
///
/// The false-positive flags decide which rows `koi select` keeps as
/// candidates, so a model trained on them would only relearn that rule.
pub const DEFAULT_DROP_COLUMNS: &[&str] = &[
    "rowid",
    "kepid",
    "kepoi_name",
    "kepler_name",
    "koi_pdisposition",
    "koi_score",
    "koi_fpflag_nt",
    "koi_fpflag_ss",
    "koi_fpflag_co",
    "koi_fpflag_ec",
    "koi_tce_delivname",
];

/// How to treat missing feature values left after column filtering.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingStrategy {
    /// Drop every row with at least one missing feature.
    DropRows,
    /// Fill with the training-split column mean.
    Mean,
    /// Fill with the training-split column median.
    #[default]
    Median,
    /// Fill with the most frequent training-split value.
    MostFrequent,
    /// Fill with a constant.
    Constant(f64),
}

impl MissingStrategy {
    fn impute_strategy(&self) -> Option<ImputeStrategy> {
        match self {
            MissingStrategy::DropRows => None,
            MissingStrategy::Mean => Some(ImputeStrategy::Mean),
            MissingStrategy::Median => Some(ImputeStrategy::Median),
            MissingStrategy::MostFrequent => Some(ImputeStrategy::MostFrequent),
            MissingStrategy::Constant(v) => Some(ImputeStrategy::Constant(*v)),
        }
    }
}

/// Preprocessing options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Label column.
    pub target_column: String,
    /// Columns removed before feature selection. Absent names are ignored.
    pub drop_columns: Vec<String>,
    /// Feature columns with a larger share of missing cells are dropped.
    pub max_missing_fraction: f64,
    pub missing: MissingStrategy,
    pub test_size: f64,
    pub seed: u64,
    /// Keep class proportions equal in both splits.
    pub stratify: bool,
    /// Standardize features. When false the stored scaler is the identity.
    pub scale: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            target_column: "koi_disposition".to_string(),
            drop_columns: DEFAULT_DROP_COLUMNS.iter().map(|s| s.to_string()).collect(),
            max_missing_fraction: 0.5,
            missing: MissingStrategy::default(),
            test_size: DEFAULT_TEST_SIZE,
            seed: DEFAULT_SEED,
            stratify: true,
            scale: true,
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<(), PreprocessingError> {
        if self.target_column.is_empty() {
            return Err(PreprocessingError::InvalidParameter(
                "target_column must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_missing_fraction) {
            return Err(PreprocessingError::InvalidParameter(format!(
                "max_missing_fraction must be in [0, 1], got {}",
                self.max_missing_fraction
            )));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PreprocessingError::InvalidParameter(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if let MissingStrategy::Constant(v) = self.missing {
            if !v.is_finite() {
                return Err(PreprocessingError::InvalidParameter(
                    "constant fill value must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Column selection plus fitted transforms, applied identically at inference.
#[derive(Clone, Debug)]
pub struct FittedFeatures {
    feature_names: Vec<String>,
    imputer: Option<FittedSimpleImputer>,
    scaler: FittedStandardScaler,
}

impl FittedFeatures {
    pub fn new(
        feature_names: Vec<String>,
        imputer: Option<FittedSimpleImputer>,
        scaler: FittedStandardScaler,
    ) -> Result<Self, PreprocessingError> {
        let n = feature_names.len();
        let widths = std::iter::once(scaler.n_features_in())
            .chain(imputer.iter().map(|imputer| imputer.n_features_in()));
        for width in widths {
            if width != n {
                return Err(PreprocessingError::FeatureMismatch {
                    expected_features: n,
                    got_features: width,
                });
            }
        }
        Ok(Self {
            feature_names,
            imputer,
            scaler,
        })
    }

    /// Ordered input column names.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn imputer(&self) -> Option<&FittedSimpleImputer> {
        self.imputer.as_ref()
    }

    pub fn scaler(&self) -> &FittedStandardScaler {
        &self.scaler
    }

    /// Impute (if configured) and scale a raw feature matrix.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, PreprocessingError> {
        let filled = match &self.imputer {
            Some(imputer) => imputer.transform(x)?,
            None => {
                if x.iter().any(|v| v.is_nan()) {
                    return Err(PreprocessingError::MissingValues(
                        "input has missing feature values and no imputer was fitted".to_string(),
                    ));
                }
                x.clone()
            }
        };
        self.scaler.transform(&filled)
    }

    /// Select the stored feature columns from a table and transform them.
    pub fn transform_table(&self, table: &FeatureTable) -> Result<Array2<f64>, PreprocessingError> {
        let raw = feature_matrix(table, &self.feature_names)?;
        self.transform(&raw)
    }
}

/// Output of [`Preprocessor::prepare`].
#[derive(Clone, Debug)]
pub struct PreparedData {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Vec<usize>,
    pub y_test: Vec<usize>,
    pub features: FittedFeatures,
    pub label_encoder: FittedLabelEncoder,
    /// Columns removed before training, in table order.
    pub dropped_columns: Vec<String>,
    /// Rows removed for a missing target or (with `DropRows`) missing features.
    pub dropped_rows: usize,
}

impl PreparedData {
    pub fn feature_names(&self) -> &[String] {
        self.features.feature_names()
    }

    pub fn n_classes(&self) -> usize {
        self.label_encoder.n_classes()
    }
}

/// Turns a feature table into model-ready matrices.
#[derive(Clone, Debug, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    pub fn prepare(&self, table: &FeatureTable) -> Result<PreparedData, PreprocessingError> {
        let config = &self.config;
        config.validate()?;

        let target = &config.target_column;
        if !table.has_column(target) {
            return Err(PreprocessingError::MissingColumn(target.clone()));
        }

        // 1. rows with a label
        let labels = table.labels(target)?;
        let labelled: Vec<bool> = labels.iter().map(Option::is_some).collect();
        let mut table = table.filter_rows(&labelled)?;
        let mut dropped_rows = labels.len() - table.n_rows();
        if table.n_rows() == 0 {
            return Err(PreprocessingError::EmptyData(format!(
                "no rows with a value in target column {}",
                target
            )));
        }

        // 2-3. column filtering
        let mut dropped_columns = Vec::new();
        let mut feature_names = Vec::new();
        let n_rows = table.n_rows() as f64;
        for (name, column) in table.iter() {
            if name == target {
                continue;
            }
            let configured = config.drop_columns.iter().any(|c| c == name);
            let categorical = matches!(column, Column::Categorical(_));
            let too_sparse = column.missing_count() as f64 / n_rows > config.max_missing_fraction;
            if configured || categorical || too_sparse {
                debug!(column = name, configured, categorical, too_sparse, "dropping column");
                dropped_columns.push(name.to_string());
            } else {
                feature_names.push(name.to_string());
            }
        }
        if feature_names.is_empty() {
            return Err(PreprocessingError::EmptyData(
                "no numeric feature columns left after filtering".to_string(),
            ));
        }

        // 4. rows with missing features
        let impute = config.missing.impute_strategy();
        if impute.is_none() {
            let mut keep = vec![true; table.n_rows()];
            for name in &feature_names {
                let column = table.column(name)?;
                for (row, flag) in keep.iter_mut().enumerate() {
                    if column.is_missing(row) {
                        *flag = false;
                    }
                }
            }
            let before = table.n_rows();
            table = table.filter_rows(&keep)?;
            dropped_rows += before - table.n_rows();
            if table.n_rows() == 0 {
                return Err(PreprocessingError::EmptyData(
                    "every row has a missing feature value".to_string(),
                ));
            }
        }

        // 5. labels and split
        let label_strings: Vec<String> = table
            .labels(target)?
            .into_iter()
            .flatten()
            .collect();
        let label_encoder = LabelEncoder::new().fit(&label_strings)?;
        let y = label_encoder.transform(&label_strings)?;
        let x = feature_matrix(&table, &feature_names)?;

        let stratify = config.stratify.then_some(y.as_slice());
        let split = train_test_split(x.nrows(), config.test_size, config.seed, stratify)?;
        let raw_train = x.select(Axis(0), &split.train);
        let raw_test = x.select(Axis(0), &split.test);
        let y_train: Vec<usize> = split.train.iter().map(|&i| y[i]).collect();
        let y_test: Vec<usize> = split.test.iter().map(|&i| y[i]).collect();

        // 6. transforms fitted on train only
        let imputer = match impute {
            Some(strategy) => Some(SimpleImputer::new(strategy).fit(&raw_train)?),
            None => None,
        };
        let filled_train = match &imputer {
            Some(imputer) => imputer.transform(&raw_train)?,
            None => raw_train.clone(),
        };
        let scaler = StandardScaler::new()
            .with_mean(config.scale)
            .with_std(config.scale)
            .fit(&filled_train)?;
        let features = FittedFeatures::new(feature_names, imputer, scaler)?;

        let x_train = features.transform(&raw_train)?;
        let x_test = features.transform(&raw_test)?;

        info!(
            train = x_train.nrows(),
            test = x_test.nrows(),
            features = features.feature_names().len(),
            classes = label_encoder.n_classes(),
            dropped_columns = dropped_columns.len(),
            dropped_rows,
            "prepared data"
        );

        Ok(PreparedData {
            x_train,
            x_test,
            y_train,
            y_test,
            features,
            label_encoder,
            dropped_columns,
            dropped_rows,
        })
    }
}

/// Dense matrix of the named numeric columns, in the given order.
pub fn feature_matrix<S: AsRef<str>>(
    table: &FeatureTable,
    names: &[S],
) -> Result<Array2<f64>, PreprocessingError> {
    let mut x = Array2::<f64>::zeros((table.n_rows(), names.len()));
    for (j, name) in names.iter().enumerate() {
        let name = name.as_ref();
        let values = match table.column(name)? {
            Column::Numeric(values) => values,
            Column::Categorical(_) => {
                return Err(PreprocessingError::InvalidParameter(format!(
                    "feature column {} is not numeric",
                    name
                )))
            }
        };
        for (i, &v) in values.iter().enumerate() {
            x[[i, j]] = v;
        }
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn koi_table() -> FeatureTable {
        let n = 20;
        let disposition: Vec<Option<String>> = (0..n)
            .map(|i| match i {
                19 => None,
                i if i % 2 == 0 => Some("CANDIDATE".to_string()),
                _ => Some("FALSE POSITIVE".to_string()),
            })
            .collect();
        let period: Vec<f64> = (0..n).map(|i| 1.0 + i as f64).collect();
        let depth: Vec<f64> = (0..n)
            .map(|i| if i == 3 { f64::NAN } else { 100.0 * i as f64 })
            .collect();
        let sparse: Vec<f64> = (0..n)
            .map(|i| if i < 15 { f64::NAN } else { i as f64 })
            .collect();
        FeatureTable::from_columns(vec![
            ("kepid", Column::Numeric((0..n).map(|i| i as f64).collect())),
            (
                "kepoi_name",
                Column::Categorical((0..n).map(|i| Some(format!("K{:05}.01", i))).collect()),
            ),
            ("koi_disposition", Column::Categorical(disposition)),
            ("koi_period", Column::Numeric(period)),
            ("koi_depth", Column::Numeric(depth)),
            ("koi_sparse", Column::Numeric(sparse)),
        ])
        .unwrap()
    }

    #[test]
    fn test_prepare_selects_numeric_features() {
        let prepared = Preprocessor::default().prepare(&koi_table()).unwrap();
        assert_eq!(prepared.feature_names(), &["koi_period", "koi_depth"]);
        assert_eq!(
            prepared.dropped_columns,
            vec!["kepid", "kepoi_name", "koi_sparse"]
        );
        assert_eq!(prepared.dropped_rows, 1);
        assert_eq!(prepared.n_classes(), 2);
        assert_eq!(prepared.x_train.nrows() + prepared.x_test.nrows(), 19);
        assert_eq!(prepared.x_test.nrows(), 4);
    }

    #[test]
    fn test_prepare_drops_false_positive_flags() {
        let mut table = koi_table();
        for (k, flag) in crate::selection::FP_FLAG_COLUMNS.iter().enumerate() {
            let values = (0..table.n_rows())
                .map(|i| if i % 2 == 1 && i % 4 == k { 1.0 } else { 0.0 })
                .collect();
            table.push_column(*flag, Column::Numeric(values)).unwrap();
        }
        let prepared = Preprocessor::default().prepare(&table).unwrap();
        assert_eq!(prepared.feature_names(), &["koi_period", "koi_depth"]);
        for flag in crate::selection::FP_FLAG_COLUMNS {
            assert!(prepared.dropped_columns.iter().any(|c| c == flag), "{flag}");
        }
    }

    #[test]
    fn test_prepare_scaler_fit_on_train_only() {
        let prepared = Preprocessor::default().prepare(&koi_table()).unwrap();
        let mean = prepared.x_train.mean_axis(Axis(0)).unwrap();
        let std = prepared.x_train.std_axis(Axis(0), 0.0);
        for j in 0..2 {
            assert_abs_diff_eq!(mean[j], 0.0, epsilon = 1e-10);
            assert_abs_diff_eq!(std[j], 1.0, epsilon = 1e-10);
        }
        assert!(prepared.x_test.iter().all(|v| v.is_finite()));
        assert!(prepared.features.imputer().is_some());
    }

    #[test]
    fn test_prepare_drop_rows() {
        let config = PreprocessConfig {
            missing: MissingStrategy::DropRows,
            ..Default::default()
        };
        let prepared = Preprocessor::new(config).prepare(&koi_table()).unwrap();
        assert_eq!(prepared.dropped_rows, 2);
        assert!(prepared.features.imputer().is_none());
        assert_eq!(prepared.x_train.nrows() + prepared.x_test.nrows(), 18);
    }

    #[test]
    fn test_prepare_stratified_keeps_both_classes_in_test() {
        let prepared = Preprocessor::default().prepare(&koi_table()).unwrap();
        assert!(prepared.y_test.contains(&0));
        assert!(prepared.y_test.contains(&1));
    }

    #[test]
    fn test_prepare_missing_target() {
        let config = PreprocessConfig {
            target_column: "tfopwg_disp".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Preprocessor::new(config).prepare(&koi_table()),
            Err(PreprocessingError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_prepare_no_features_left() {
        let config = PreprocessConfig {
            drop_columns: vec!["koi_period".to_string(), "koi_depth".to_string()],
            ..Default::default()
        };
        let mut table = koi_table();
        table.drop_columns(&["kepid", "koi_sparse"]);
        assert!(matches!(
            Preprocessor::new(config).prepare(&table),
            Err(PreprocessingError::EmptyData(_))
        ));
    }

    #[test]
    fn test_invalid_config() {
        let config = PreprocessConfig {
            test_size: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_transform_table_matches_training_transform() {
        let table = koi_table();
        let prepared = Preprocessor::default().prepare(&table).unwrap();
        let all = prepared.features.transform_table(&table).unwrap();
        assert_eq!(all.ncols(), 2);
        assert_eq!(all.nrows(), table.n_rows());
    }

    #[test]
    fn test_feature_matrix_unknown_column() {
        let result = feature_matrix(&koi_table(), &["koi_prad"]);
        assert!(matches!(result, Err(PreprocessingError::MissingColumn(_))));
    }

    #[test]
    fn test_fitted_features_width_check() {
        let scaler = StandardScaler::new()
            .fit(&Array2::<f64>::ones((2, 3)))
            .unwrap();
        assert!(FittedFeatures::new(vec!["a".to_string()], None, scaler).is_err());
    }
}
