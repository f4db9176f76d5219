//! Simple Imputer.
//!
//! Fills missing values (NaN) column by column with a statistic learned from
//! the training split: mean, median, most frequent value, or a constant.
//!
//! # Example
//! ```rust
//! use koi_classifier::preprocessing::{FittedTransformer, ImputeStrategy, SimpleImputer, Transformer};
//! use ndarray::array;
//!
//! let data = array![[1.0, f64::NAN], [3.0, 4.0], [5.0, 6.0]];
//! let fitted = SimpleImputer::new(ImputeStrategy::Mean).fit(&data).unwrap();
//! let imputed = fitted.transform(&data).unwrap();
//! assert_eq!(imputed[[0, 1]], 5.0);
//! ```

use crate::preprocessing::error::PreprocessingError;
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Strategy for imputing missing values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    /// Replace missing values with the mean of each column.
    #[default]
    Mean,
    /// Replace missing values with the median of each column.
    Median,
    /// Replace missing values with the most frequent value of each column.
    MostFrequent,
    /// Replace missing values with a constant value.
    Constant(f64),
}

/// Serializable parameters for a fitted SimpleImputer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimpleImputerParams {
    /// Strategy used for imputation.
    pub strategy: ImputeStrategy,
    /// Fill value for each feature.
    pub statistics: Vec<f64>,
    /// Number of features seen during fit.
    pub n_features: usize,
}

/// SimpleImputer transformer (unfitted).
#[derive(Clone, Debug, Default)]
pub struct SimpleImputer {
    strategy: ImputeStrategy,
}

impl SimpleImputer {
    /// Create a new SimpleImputer with the specified strategy.
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &ImputeStrategy {
        &self.strategy
    }
}

/// Fill value for one column, ignoring NaN. An all-missing column yields 0.
fn column_statistic(column: ArrayView1<f64>, strategy: &ImputeStrategy) -> f64 {
    let mut values: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
    if values.is_empty() {
        return 0.0;
    }

    match strategy {
        ImputeStrategy::Mean => values.iter().sum::<f64>() / values.len() as f64,
        ImputeStrategy::Median => {
            values.sort_by(f64::total_cmp);
            let n = values.len();
            if n % 2 == 0 {
                (values[n / 2 - 1] + values[n / 2]) / 2.0
            } else {
                values[n / 2]
            }
        }
        ImputeStrategy::MostFrequent => {
            let mut counts: HashMap<u64, usize> = HashMap::new();
            for &v in &values {
                *counts.entry(v.to_bits()).or_insert(0) += 1;
            }
            // Ties go to the smallest value so the result is deterministic.
            counts
                .into_iter()
                .map(|(bits, count)| (f64::from_bits(bits), count))
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.total_cmp(&a.0)))
                .map(|(value, _)| value)
                .unwrap_or(0.0)
        }
        ImputeStrategy::Constant(val) => *val,
    }
}

impl Transformer for SimpleImputer {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = SimpleImputerParams;
    type Fitted = FittedSimpleImputer;

    fn fit(&self, data: &Self::Input) -> Result<Self::Fitted, PreprocessingError> {
        if data.nrows() == 0 {
            return Err(PreprocessingError::EmptyData(
                "Cannot fit SimpleImputer on empty data".to_string(),
            ));
        }

        let statistics: Array1<f64> = data
            .columns()
            .into_iter()
            .map(|column| column_statistic(column, &self.strategy))
            .collect();

        Ok(FittedSimpleImputer {
            strategy: self.strategy.clone(),
            statistics,
            n_features: data.ncols(),
        })
    }
}

/// Fitted SimpleImputer ready for inference.
#[derive(Clone, Debug)]
pub struct FittedSimpleImputer {
    strategy: ImputeStrategy,
    statistics: Array1<f64>,
    n_features: usize,
}

impl FittedSimpleImputer {
    /// Fill values for each feature.
    pub fn statistics(&self) -> &Array1<f64> {
        &self.statistics
    }

    pub fn strategy(&self) -> &ImputeStrategy {
        &self.strategy
    }
}

impl FittedTransformer for FittedSimpleImputer {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = SimpleImputerParams;

    fn transform(&self, data: &Self::Input) -> Result<Self::Output, PreprocessingError> {
        if data.ncols() != self.n_features {
            return Err(PreprocessingError::FeatureMismatch {
                expected_features: self.n_features,
                got_features: data.ncols(),
            });
        }

        let mut result = data.clone();
        for (mut column, &fill) in result.columns_mut().into_iter().zip(&self.statistics) {
            column.mapv_inplace(|v| if v.is_nan() { fill } else { v });
        }
        Ok(result)
    }

    fn inverse_transform(&self, _data: &Self::Output) -> Result<Self::Input, PreprocessingError> {
        Err(PreprocessingError::InvalidParameter(
            "SimpleImputer does not support inverse_transform (missing value information is lost)"
                .to_string(),
        ))
    }

    fn extract_params(&self) -> Self::Params {
        SimpleImputerParams {
            strategy: self.strategy.clone(),
            statistics: self.statistics.to_vec(),
            n_features: self.n_features,
        }
    }

    fn from_params(params: Self::Params) -> Result<Self, PreprocessingError> {
        if params.statistics.len() != params.n_features {
            return Err(PreprocessingError::InvalidShape {
                expected: format!("{} statistics", params.n_features),
                got: format!("{} statistics", params.statistics.len()),
            });
        }
        Ok(Self {
            strategy: params.strategy,
            statistics: Array1::from(params.statistics),
            n_features: params.n_features,
        })
    }

    fn n_features_in(&self) -> usize {
        self.n_features
    }
}
