//! Random forest classifier.
//!
//! Each tree is grown on a bootstrap sample of the training rows and looks at
//! a random subset of features at every split. Probabilities are the mean of
//! the trees' leaf distributions. All randomness derives from `seed`, so a
//! fixed configuration always produces the same forest.

use crate::model::error::ModelError;
use crate::model::tree::{grow_tree, Criterion, DecisionTreeConfig, MaxFeatures, TreeParams};
use crate::model::{check_features, check_training_data, normalize, Classifier, FittedClassifier};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random forest hyperparameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RandomForestConfig {
    pub n_estimators: usize,
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Draw a bootstrap sample per tree; otherwise every tree sees all rows.
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            criterion: Criterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl RandomForestConfig {
    fn tree_config(&self, seed: u64) -> DecisionTreeConfig {
        DecisionTreeConfig {
            criterion: self.criterion,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            seed,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidParameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        self.tree_config(self.seed).validate()
    }
}

/// Serializable parameters of a fitted forest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub trees: Vec<TreeParams>,
    pub n_features: usize,
    pub n_classes: usize,
}

/// Random forest classifier (unfitted).
#[derive(Clone, Debug, Default)]
pub struct RandomForest {
    config: RandomForestConfig,
}

impl RandomForest {
    pub fn new(config: RandomForestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RandomForestConfig {
        &self.config
    }
}

impl Classifier for RandomForest {
    type Params = ForestParams;
    type Fitted = FittedRandomForest;

    fn fit(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<Self::Fitted, ModelError> {
        self.config.validate()?;
        check_training_data(x, y, n_classes)?;

        let n = x.nrows();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut trees = Vec::with_capacity(self.config.n_estimators);
        for _ in 0..self.config.n_estimators {
            let mut indices: Vec<usize> = if self.config.bootstrap {
                (0..n).map(|_| rng.random_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            let tree_config = self.config.tree_config(rng.random());
            trees.push(grow_tree(x, y, n_classes, &mut indices, &tree_config));
        }

        debug!(
            trees = trees.len(),
            mean_depth = trees.iter().map(TreeParams::depth).sum::<usize>() as f64
                / trees.len() as f64,
            "fitted random forest"
        );

        Ok(FittedRandomForest {
            params: ForestParams {
                trees,
                n_features: x.ncols(),
                n_classes,
            },
        })
    }
}

/// Fitted random forest.
#[derive(Clone, Debug)]
pub struct FittedRandomForest {
    params: ForestParams,
}

impl FittedRandomForest {
    pub fn n_trees(&self) -> usize {
        self.params.trees.len()
    }
}

impl FittedClassifier for FittedRandomForest {
    type Params = ForestParams;

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        check_features(x, self.params.n_features)?;
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.params.n_classes));
        for (sample, mut out) in x.rows().into_iter().zip(proba.rows_mut()) {
            for tree in &self.params.trees {
                for (o, &p) in out.iter_mut().zip(tree.leaf_distribution(sample)) {
                    *o += p;
                }
            }
        }
        proba /= self.params.trees.len() as f64;
        Ok(proba)
    }

    fn n_features_in(&self) -> usize {
        self.params.n_features
    }

    fn n_classes(&self) -> usize {
        self.params.n_classes
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        let mut total = vec![0.0; self.params.n_features];
        for tree in &self.params.trees {
            for (t, &v) in total.iter_mut().zip(&tree.importances) {
                *t += v;
            }
        }
        normalize(&mut total);
        Some(Array1::from(total))
    }

    fn extract_params(&self) -> Self::Params {
        self.params.clone()
    }

    fn from_params(params: Self::Params) -> Result<Self, ModelError> {
        if params.trees.is_empty() {
            return Err(ModelError::Serialization("forest has no trees".to_string()));
        }
        for tree in &params.trees {
            if tree.n_features != params.n_features || tree.n_classes != params.n_classes {
                return Err(ModelError::Serialization(
                    "tree shape differs from forest shape".to_string(),
                ));
            }
            tree.validate()?;
        }
        Ok(Self { params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::Rng;

    /// Two Gaussian-ish blobs separated along the first two features, plus noise columns.
    fn blobs(n: usize, seed: u64) -> (Array2<f64>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut x = Array2::zeros((n, 4));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let class = i % 2;
            let center = if class == 0 { -2.0 } else { 2.0 };
            x[[i, 0]] = center + rng.random_range(-1.5..1.5);
            x[[i, 1]] = center + rng.random_range(-1.5..1.5);
            x[[i, 2]] = rng.random_range(-3.0..3.0);
            x[[i, 3]] = rng.random_range(-3.0..3.0);
            y.push(class);
        }
        (x, y)
    }

    fn small_config() -> RandomForestConfig {
        RandomForestConfig {
            n_estimators: 15,
            ..Default::default()
        }
    }

    #[test]
    fn test_forest_separates_blobs() {
        let (x, y) = blobs(120, 1);
        let (x_test, y_test) = blobs(60, 2);
        let fitted = RandomForest::new(small_config()).fit(&x, &y, 2).unwrap();

        let pred = fitted.predict(&x_test).unwrap();
        let correct = pred.iter().zip(&y_test).filter(|(a, b)| a == b).count();
        assert!(correct as f64 / y_test.len() as f64 > 0.9);
    }

    #[test]
    fn test_forest_proba_rows_sum_to_one() {
        let (x, y) = blobs(40, 3);
        let fitted = RandomForest::new(small_config()).fit(&x, &y, 2).unwrap();
        let proba = fitted.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (x, y) = blobs(50, 4);
        let a = RandomForest::new(small_config()).fit(&x, &y, 2).unwrap();
        let b = RandomForest::new(small_config()).fit(&x, &y, 2).unwrap();
        assert_eq!(a.extract_params(), b.extract_params());
    }

    #[test]
    fn test_forest_importances_rank_signal_first() {
        let (x, y) = blobs(200, 5);
        let fitted = RandomForest::new(small_config()).fit(&x, &y, 2).unwrap();
        let imp = fitted.feature_importances().unwrap();
        assert_abs_diff_eq!(imp.sum(), 1.0, epsilon = 1e-9);
        assert!(imp[0] > imp[2] && imp[0] > imp[3]);
        assert!(imp[1] > imp[2] && imp[1] > imp[3]);
    }

    #[test]
    fn test_forest_zero_estimators_rejected() {
        let (x, y) = blobs(10, 6);
        let config = RandomForestConfig {
            n_estimators: 0,
            ..Default::default()
        };
        assert!(matches!(
            RandomForest::new(config).fit(&x, &y, 2),
            Err(ModelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_forest_save_load() {
        let (x, y) = blobs(40, 7);
        let fitted = RandomForest::new(small_config()).fit(&x, &y, 2).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forest.bin");
        fitted.save_to_file(&path).unwrap();
        let loaded = FittedRandomForest::load_from_file(&path).unwrap();

        assert_eq!(loaded.n_trees(), 15);
        assert_eq!(loaded.predict(&x).unwrap(), fitted.predict(&x).unwrap());
    }

    #[test]
    fn test_forest_feature_mismatch() {
        let (x, y) = blobs(20, 8);
        let fitted = RandomForest::new(small_config()).fit(&x, &y, 2).unwrap();
        assert!(matches!(
            fitted.predict(&Array2::zeros((1, 3))),
            Err(ModelError::FeatureMismatch { expected: 4, got: 3 })
        ));
    }
}
