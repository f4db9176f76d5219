//! Second-order gradient boosted trees (XGBoost-style).
//!
//! Each round fits a regression tree to the gradient `g` and hessian `h` of
//! the loss at the current raw scores. For a node holding sums `G`, `H`:
//!
//! ```text
//! leaf weight  w    = −G / (H + λ)
//! split gain        = ½ [G_L²/(H_L+λ) + G_R²/(H_R+λ) − G²/(H+λ)] − γ
//! ```
//!
//! Splits need a positive gain and at least `min_child_weight` hessian on
//! each side. Leaf weights are shrunk by `learning_rate`.
//!
//! Two classes use the logistic loss on one raw score per sample. More
//! classes use softmax with one tree per class per round.

use crate::model::error::ModelError;
use crate::model::{check_features, check_training_data, normalize, sigmoid, Classifier, FittedClassifier};
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

const MIN_HESSIAN: f64 = 1e-16;

/// Gradient boosting hyperparameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GradientBoostingConfig {
    /// Boosting rounds.
    pub n_estimators: usize,
    /// Shrinkage applied to every leaf weight (`eta`).
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Minimum hessian sum in each child.
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights.
    pub lambda: f64,
    /// Minimum loss reduction required to split.
    pub gamma: f64,
    /// Fraction of rows sampled (without replacement) per round.
    pub subsample: f64,
    pub seed: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            lambda: 1.0,
            gamma: 0.0,
            subsample: 1.0,
            seed: 42,
        }
    }
}

impl GradientBoostingConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |msg: String| Err(ModelError::InvalidParameter(msg));
        if self.n_estimators == 0 {
            return invalid("n_estimators must be at least 1".to_string());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return invalid(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            ));
        }
        if self.max_depth == 0 {
            return invalid("max_depth must be at least 1".to_string());
        }
        if self.min_child_weight < 0.0 || self.lambda < 0.0 || self.gamma < 0.0 {
            return invalid("min_child_weight, lambda and gamma must be non-negative".to_string());
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return invalid(format!(
                "subsample must be in (0, 1], got {}",
                self.subsample
            ));
        }
        Ok(())
    }
}

/// Node of a regression tree. Children are indices into [`RegressionTree::nodes`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RegressionNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        weight: f64,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<RegressionNode>,
}

impl RegressionTree {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                RegressionNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if sample[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                RegressionNode::Leaf { weight } => return *weight,
            }
        }
    }

    fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Serialization("regression tree has no nodes".to_string()));
        }
        for (id, node) in self.nodes.iter().enumerate() {
            if let RegressionNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                let n = self.nodes.len();
                if *feature >= n_features || *left <= id || *right <= id || *left >= n || *right >= n
                {
                    return Err(ModelError::Serialization(format!(
                        "invalid split node {}",
                        id
                    )));
                }
            }
        }
        Ok(())
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeGrower<'a> {
    x: &'a Array2<f64>,
    grad: &'a [f64],
    hess: &'a [f64],
    config: &'a GradientBoostingConfig,
    nodes: Vec<RegressionNode>,
    gains: &'a mut [f64],
}

impl<'a> TreeGrower<'a> {
    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.config.lambda)
    }

    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.config.lambda) * self.config.learning_rate
    }

    fn grow(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let g: f64 = indices.iter().map(|&i| self.grad[i]).sum();
        let h: f64 = indices.iter().map(|&i| self.hess[i]).sum();
        let id = self.nodes.len();

        let split = if depth < self.config.max_depth && indices.len() >= 2 {
            self.best_split(indices, g, h)
        } else {
            None
        };
        let Some(split) = split else {
            self.nodes.push(RegressionNode::Leaf {
                weight: self.leaf_weight(g, h),
            });
            return id;
        };

        self.gains[split.feature] += split.gain;
        self.nodes.push(RegressionNode::Leaf { weight: 0.0 });

        let mut n_left = 0;
        for i in 0..indices.len() {
            if self.x[[indices[i], split.feature]] <= split.threshold {
                indices.swap(i, n_left);
                n_left += 1;
            }
        }
        let (left_idx, right_idx) = indices.split_at_mut(n_left);
        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);
        self.nodes[id] = RegressionNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&self, indices: &[usize], g: f64, h: f64) -> Option<Split> {
        let parent = self.score(g, h);
        let min_child = self.config.min_child_weight;
        let mut best: Option<Split> = None;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(indices.len());

        for feature in 0..self.x.ncols() {
            sorted.clear();
            sorted.extend(indices.iter().map(|&i| (self.x[[i, feature]], i)));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut g_left = 0.0;
            let mut h_left = 0.0;
            for pos in 0..sorted.len() - 1 {
                let (value, i) = sorted[pos];
                g_left += self.grad[i];
                h_left += self.hess[i];
                let next = sorted[pos + 1].0;
                if value == next {
                    continue;
                }
                let h_right = h - h_left;
                if h_left < min_child || h_right < min_child {
                    continue;
                }
                let gain = 0.5
                    * (self.score(g_left, h_left) + self.score(g - g_left, h_right) - parent)
                    - self.config.gamma;
                if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(Split {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }
        best
    }
}

fn grow_regression_tree(
    x: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    indices: &mut [usize],
    config: &GradientBoostingConfig,
    gains: &mut [f64],
) -> RegressionTree {
    let mut grower = TreeGrower {
        x,
        grad,
        hess,
        config,
        nodes: Vec::new(),
        gains,
    };
    grower.grow(indices, 0);
    RegressionTree {
        nodes: grower.nodes,
    }
}

/// Serializable parameters of a fitted booster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    /// Round-major: tree `t` adds to raw score `t % n_outputs`.
    pub trees: Vec<RegressionTree>,
    /// 1 for two classes, otherwise the number of classes.
    pub n_outputs: usize,
    pub base_score: f64,
    pub n_features: usize,
    pub n_classes: usize,
    /// Total split gain per feature.
    pub gains: Vec<f64>,
}

/// Gradient boosting classifier (unfitted).
#[derive(Clone, Debug, Default)]
pub struct GradientBoosting {
    config: GradientBoostingConfig,
}

impl GradientBoosting {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }
}

/// Softmax of one row of raw scores, in place.
fn softmax(scores: &mut [f64]) {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
    }
    let total: f64 = scores.iter().sum();
    for s in scores.iter_mut() {
        *s /= total;
    }
}

impl Classifier for GradientBoosting {
    type Params = BoostingParams;
    type Fitted = FittedGradientBoosting;

    fn fit(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<Self::Fitted, ModelError> {
        let config = &self.config;
        config.validate()?;
        check_training_data(x, y, n_classes)?;

        let n = x.nrows();
        let n_outputs = if n_classes == 2 { 1 } else { n_classes };
        let base_score = 0.0;
        let mut raw = Array2::<f64>::from_elem((n, n_outputs), base_score);
        let mut grad = vec![vec![0.0; n]; n_outputs];
        let mut hess = vec![vec![0.0; n]; n_outputs];
        let mut gains = vec![0.0; x.ncols()];
        let mut trees = Vec::with_capacity(config.n_estimators * n_outputs);
        let mut rng = StdRng::seed_from_u64(config.seed);
        let n_sample = ((config.subsample * n as f64).ceil() as usize).clamp(1, n);

        for round in 0..config.n_estimators {
            // gradients of the loss at the current raw scores
            let mut row = vec![0.0; n_outputs];
            for i in 0..n {
                if n_outputs == 1 {
                    let p = sigmoid(raw[[i, 0]]);
                    let target = if y[i] == 1 { 1.0 } else { 0.0 };
                    grad[0][i] = p - target;
                    hess[0][i] = (p * (1.0 - p)).max(MIN_HESSIAN);
                } else {
                    row.iter_mut()
                        .zip(raw.row(i))
                        .for_each(|(r, &v)| *r = v);
                    softmax(&mut row);
                    for k in 0..n_outputs {
                        let target = if y[i] == k { 1.0 } else { 0.0 };
                        grad[k][i] = row[k] - target;
                        hess[k][i] = (2.0 * row[k] * (1.0 - row[k])).max(MIN_HESSIAN);
                    }
                }
            }

            let sample: Vec<usize> = if n_sample < n {
                let mut s = rand::seq::index::sample(&mut rng, n, n_sample).into_vec();
                s.sort_unstable();
                s
            } else {
                (0..n).collect()
            };

            for k in 0..n_outputs {
                let mut indices = sample.clone();
                let tree =
                    grow_regression_tree(x, &grad[k], &hess[k], &mut indices, config, &mut gains);
                for (i, sample_row) in x.rows().into_iter().enumerate() {
                    raw[[i, k]] += tree.predict(sample_row);
                }
                trees.push(tree);
            }

            if round % 10 == 9 {
                debug!(round = round + 1, "boosting progress");
            }
        }

        FittedGradientBoosting::from_params(BoostingParams {
            trees,
            n_outputs,
            base_score,
            n_features: x.ncols(),
            n_classes,
            gains,
        })
    }
}

/// Fitted gradient boosting classifier.
#[derive(Clone, Debug)]
pub struct FittedGradientBoosting {
    params: BoostingParams,
}

impl FittedGradientBoosting {
    /// Raw (margin) scores: one column for two classes, else one per class.
    pub fn raw_scores(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        check_features(x, self.params.n_features)?;
        let n_outputs = self.params.n_outputs;
        let mut raw = Array2::from_elem((x.nrows(), n_outputs), self.params.base_score);
        for (t, tree) in self.params.trees.iter().enumerate() {
            let k = t % n_outputs;
            for (i, sample) in x.rows().into_iter().enumerate() {
                raw[[i, k]] += tree.predict(sample);
            }
        }
        Ok(raw)
    }

    pub fn n_rounds(&self) -> usize {
        self.params.trees.len() / self.params.n_outputs
    }
}

impl FittedClassifier for FittedGradientBoosting {
    type Params = BoostingParams;

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        let raw = self.raw_scores(x)?;
        let mut proba = Array2::zeros((x.nrows(), self.params.n_classes));
        for (i, scores) in raw.rows().into_iter().enumerate() {
            if self.params.n_outputs == 1 {
                let p = sigmoid(scores[0]);
                proba[[i, 0]] = 1.0 - p;
                proba[[i, 1]] = p;
            } else {
                let mut row = scores.to_vec();
                softmax(&mut row);
                for (k, p) in row.into_iter().enumerate() {
                    proba[[i, k]] = p;
                }
            }
        }
        Ok(proba)
    }

    fn n_features_in(&self) -> usize {
        self.params.n_features
    }

    fn n_classes(&self) -> usize {
        self.params.n_classes
    }

    /// Total split gain per feature, normalized.
    fn feature_importances(&self) -> Option<Array1<f64>> {
        let mut gains = self.params.gains.clone();
        normalize(&mut gains);
        Some(Array1::from(gains))
    }

    fn extract_params(&self) -> Self::Params {
        self.params.clone()
    }

    fn from_params(params: Self::Params) -> Result<Self, ModelError> {
        let expected_outputs = if params.n_classes == 2 {
            1
        } else {
            params.n_classes
        };
        if params.n_classes < 2
            || params.n_outputs != expected_outputs
            || params.trees.is_empty()
            || params.trees.len() % params.n_outputs != 0
            || params.gains.len() != params.n_features
        {
            return Err(ModelError::Serialization(
                "inconsistent boosting parameters".to_string(),
            ));
        }
        for tree in &params.trees {
            tree.validate(params.n_features)?;
        }
        Ok(Self { params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Vec<usize>) {
        let x = array![
            [0.0, 1.0],
            [1.0, 0.0],
            [2.0, 1.0],
            [3.0, 0.0],
            [4.0, 1.0],
            [5.0, 0.0],
            [6.0, 1.0],
            [7.0, 0.0]
        ];
        (x, vec![0, 0, 0, 0, 1, 1, 1, 1])
    }

    #[test]
    fn test_single_round_leaf_weights() {
        // One stump, λ = 0: initial p = 0.5 gives g = ±0.5, h = 0.25 per sample,
        // so each pure leaf gets w = -G/H = ∓2.
        let (x, y) = step_data();
        let config = GradientBoostingConfig {
            n_estimators: 1,
            learning_rate: 1.0,
            max_depth: 1,
            lambda: 0.0,
            min_child_weight: 0.0,
            ..Default::default()
        };
        let fitted = GradientBoosting::new(config).fit(&x, &y, 2).unwrap();
        let raw = fitted.raw_scores(&x).unwrap();
        assert_abs_diff_eq!(raw[[0, 0]], -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(raw[[7, 0]], 2.0, epsilon = 1e-12);

        match &fitted.extract_params().trees[0].nodes[0] {
            RegressionNode::Split {
                feature, threshold, ..
            } => {
                assert_eq!(*feature, 0);
                assert_abs_diff_eq!(*threshold, 3.5);
            }
            other => panic!("expected split, got {other:?}"),
        }
    }

    #[test]
    fn test_binary_fit_and_proba() {
        let (x, y) = step_data();
        let config = GradientBoostingConfig {
            n_estimators: 50,
            min_child_weight: 0.1,
            ..Default::default()
        };
        let fitted = GradientBoosting::new(config).fit(&x, &y, 2).unwrap();
        assert_eq!(fitted.predict(&x).unwrap(), y);
        assert_eq!(fitted.n_rounds(), 50);

        let proba = fitted.predict_proba(&x).unwrap();
        assert!(proba[[0, 0]] > 0.9);
        assert!(proba[[7, 1]] > 0.9);
    }

    #[test]
    fn test_gamma_blocks_weak_splits() {
        let (x, y) = step_data();
        let config = GradientBoostingConfig {
            n_estimators: 1,
            gamma: 1e6,
            ..Default::default()
        };
        let fitted = GradientBoosting::new(config).fit(&x, &y, 2).unwrap();
        assert_eq!(fitted.extract_params().trees[0].nodes.len(), 1);
    }

    #[test]
    fn test_multiclass_softmax() {
        let x = array![[0.0], [0.5], [5.0], [5.5], [10.0], [10.5]];
        let y = vec![0, 0, 1, 1, 2, 2];
        let config = GradientBoostingConfig {
            n_estimators: 30,
            min_child_weight: 0.01,
            ..Default::default()
        };
        let fitted = GradientBoosting::new(config).fit(&x, &y, 3).unwrap();
        assert_eq!(fitted.extract_params().trees.len(), 90);
        assert_eq!(fitted.predict(&x).unwrap(), y);

        let proba = fitted.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_importance_on_informative_feature() {
        let (x, y) = step_data();
        let config = GradientBoostingConfig {
            n_estimators: 5,
            min_child_weight: 0.1,
            ..Default::default()
        };
        let fitted = GradientBoosting::new(config).fit(&x, &y, 2).unwrap();
        let imp = fitted.feature_importances().unwrap();
        assert!(imp[0] > imp[1]);
        assert_abs_diff_eq!(imp.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_subsample_is_seeded() {
        let (x, y) = step_data();
        let config = GradientBoostingConfig {
            n_estimators: 5,
            subsample: 0.5,
            min_child_weight: 0.1,
            ..Default::default()
        };
        let a = GradientBoosting::new(config.clone()).fit(&x, &y, 2).unwrap();
        let b = GradientBoosting::new(config).fit(&x, &y, 2).unwrap();
        assert_eq!(a.extract_params(), b.extract_params());
    }

    #[test]
    fn test_invalid_learning_rate() {
        let (x, y) = step_data();
        let config = GradientBoostingConfig {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            GradientBoosting::new(config).fit(&x, &y, 2),
            Err(ModelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_save_load() {
        let (x, y) = step_data();
        let config = GradientBoostingConfig {
            n_estimators: 3,
            ..Default::default()
        };
        let fitted = GradientBoosting::new(config).fit(&x, &y, 2).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boost.bin");
        fitted.save_to_file(&path).unwrap();
        let loaded = FittedGradientBoosting::load_from_file(&path).unwrap();
        assert_eq!(loaded.raw_scores(&x).unwrap(), fitted.raw_scores(&x).unwrap());
    }
}
