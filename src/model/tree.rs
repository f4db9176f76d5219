//! CART decision tree classifier.
//!
//! Splits are axis-aligned thresholds chosen to minimize the weighted child
//! impurity (Gini or entropy). Thresholds sit halfway between consecutive
//! distinct feature values; samples with `x <= threshold` go left. Leaves
//! store the class distribution of the training samples that reached them.
//!
//! The tree is also the base learner of [`RandomForest`](super::RandomForest),
//! which grows trees on bootstrap samples through [`grow_tree`].

use crate::model::error::ModelError;
use crate::model::{check_features, check_training_data, normalize, Classifier, FittedClassifier};
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Impurity measure used to score splits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    #[default]
    Gini,
    Entropy,
}

impl Criterion {
    fn impurity(&self, counts: &[f64], total: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        match self {
            Criterion::Gini => 1.0 - counts.iter().map(|&c| (c / total).powi(2)).sum::<f64>(),
            Criterion::Entropy => counts
                .iter()
                .filter(|&&c| c > 0.0)
                .map(|&c| {
                    let p = c / total;
                    -p * p.log2()
                })
                .sum(),
        }
    }
}

/// Number of features considered at each split.
///
/// Written as `all`, `sqrt`, `log2` or a fraction in (0, 1] in config files.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum MaxFeatures {
    #[default]
    All,
    Sqrt,
    Log2,
    /// Fraction of the features, in (0, 1].
    Fraction(f64),
}

impl Serialize for MaxFeatures {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MaxFeatures::All => serializer.serialize_str("all"),
            MaxFeatures::Sqrt => serializer.serialize_str("sqrt"),
            MaxFeatures::Log2 => serializer.serialize_str("log2"),
            MaxFeatures::Fraction(f) => serializer.serialize_f64(*f),
        }
    }
}

impl<'de> Deserialize<'de> for MaxFeatures {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NumOrStr {
            Num(f64),
            Str(String),
        }

        match NumOrStr::deserialize(deserializer)? {
            NumOrStr::Num(f) => Ok(MaxFeatures::Fraction(f)),
            NumOrStr::Str(s) => match s.as_str() {
                "all" => Ok(MaxFeatures::All),
                "sqrt" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                other => Err(de::Error::custom(format!(
                    "max_features must be `all`, `sqrt`, `log2` or a fraction, got `{other}`"
                ))),
            },
        }
    }
}

impl MaxFeatures {
    /// Resolve to a count in `1..=n_features`.
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => n.sqrt().floor() as usize,
            MaxFeatures::Log2 => n.log2().floor() as usize,
            MaxFeatures::Fraction(f) => (f * n).floor() as usize,
        };
        k.clamp(1, n_features.max(1))
    }

    fn validate(&self) -> Result<(), ModelError> {
        if let MaxFeatures::Fraction(f) = self {
            if !(*f > 0.0 && *f <= 1.0) {
                return Err(ModelError::InvalidParameter(format!(
                    "max_features fraction must be in (0, 1], got {}",
                    f
                )));
            }
        }
        Ok(())
    }
}

/// Decision tree hyperparameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecisionTreeConfig {
    pub criterion: Criterion,
    /// Unlimited when `None`.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Seeds feature subsampling when `max_features` is not `All`.
    pub seed: u64,
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self {
            criterion: Criterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            seed: 42,
        }
    }
}

impl DecisionTreeConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.max_depth == Some(0) {
            return Err(ModelError::InvalidParameter(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(ModelError::InvalidParameter(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        if self.min_samples_leaf < 1 {
            return Err(ModelError::InvalidParameter(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        self.max_features.validate()
    }
}

/// A tree node. Children are indices into [`TreeParams::nodes`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Class probabilities.
        distribution: Vec<f64>,
    },
}

/// Serializable parameters of a fitted tree. Node 0 is the root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub nodes: Vec<Node>,
    pub n_features: usize,
    pub n_classes: usize,
    /// Normalized impurity decrease per feature.
    pub importances: Vec<f64>,
}

impl TreeParams {
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Serialization("tree has no nodes".to_string()));
        }
        if self.importances.len() != self.n_features {
            return Err(ModelError::Serialization(format!(
                "{} importances for {} features",
                self.importances.len(),
                self.n_features
            )));
        }
        for (id, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    // Children always come after their parent, so traversal terminates.
                    if *feature >= self.n_features
                        || *left <= id
                        || *right <= id
                        || *left >= self.nodes.len()
                        || *right >= self.nodes.len()
                    {
                        return Err(ModelError::Serialization(format!(
                            "invalid split node {}",
                            id
                        )));
                    }
                }
                Node::Leaf { distribution } => {
                    if distribution.len() != self.n_classes {
                        return Err(ModelError::Serialization(format!(
                            "leaf {} has {} classes, expected {}",
                            id,
                            distribution.len(),
                            self.n_classes
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Class distribution of the leaf reached by `sample`.
    pub(crate) fn leaf_distribution(&self, sample: ArrayView1<f64>) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Split {
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
                Node::Leaf { distribution } => return distribution,
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Node::Leaf { .. } => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    /// Weighted child impurity.
    score: f64,
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    n_classes: usize,
    config: &'a DecisionTreeConfig,
    max_features: usize,
    n_total: f64,
    nodes: Vec<Node>,
    importances: Vec<f64>,
    rng: StdRng,
}

impl<'a> TreeBuilder<'a> {
    fn class_counts(&self, indices: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &i in indices {
            counts[self.y[i]] += 1.0;
        }
        counts
    }

    fn build(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let n = indices.len();
        let counts = self.class_counts(indices);
        let impurity = self.config.criterion.impurity(&counts, n as f64);

        let id = self.nodes.len();
        let at_max_depth = self.config.max_depth.is_some_and(|d| depth >= d);
        let splittable = !at_max_depth
            && impurity > 0.0
            && n >= self.config.min_samples_split
            && n >= 2 * self.config.min_samples_leaf;

        let best = if splittable {
            self.best_split(indices, &counts)
        } else {
            None
        };

        let Some(best) = best else {
            let mut distribution = counts;
            normalize(&mut distribution);
            self.nodes.push(Node::Leaf { distribution });
            return id;
        };

        self.importances[best.feature] +=
            (n as f64 / self.n_total) * (impurity - best.score).max(0.0);

        // Reserve the slot; children are appended after it.
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });

        let mut n_left = 0;
        for i in 0..n {
            if self.x[[indices[i], best.feature]] <= best.threshold {
                indices.swap(i, n_left);
                n_left += 1;
            }
        }
        let (left_idx, right_idx) = indices.split_at_mut(n_left);
        let left = self.build(left_idx, depth + 1);
        let right = self.build(right_idx, depth + 1);

        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    /// Feature visiting order: all features, shuffled when subsampling.
    fn candidate_features(&mut self) -> Vec<usize> {
        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        if self.max_features < features.len() {
            features.shuffle(&mut self.rng);
        }
        features
    }

    fn best_split(&mut self, indices: &[usize], counts: &[f64]) -> Option<BestSplit> {
        let n = indices.len();
        let n_f = n as f64;
        let min_leaf = self.config.min_samples_leaf;
        let criterion = self.config.criterion;
        let mut best: Option<BestSplit> = None;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n);

        // Constant features do not use up the `max_features` budget.
        let mut visited = 0;
        for feature in self.candidate_features() {
            if visited == self.max_features {
                break;
            }
            sorted.clear();
            sorted.extend(indices.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
            if sorted[0].0 == sorted[n - 1].0 {
                continue;
            }
            visited += 1;

            let mut left = vec![0.0; self.n_classes];
            let mut right = counts.to_vec();
            for pos in 0..n - 1 {
                let (value, label) = sorted[pos];
                left[label] += 1.0;
                right[label] -= 1.0;

                let n_left = pos + 1;
                let next = sorted[pos + 1].0;
                if value == next || n_left < min_leaf || n - n_left < min_leaf {
                    continue;
                }

                let nl = n_left as f64;
                let nr = n_f - nl;
                let score = (nl * criterion.impurity(&left, nl) + nr * criterion.impurity(&right, nr))
                    / n_f;
                if best.as_ref().map_or(true, |b| score < b.score) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        score,
                    });
                }
            }
        }
        best
    }
}

/// Grow a tree on the rows listed in `indices` (duplicates allowed).
pub(crate) fn grow_tree(
    x: &Array2<f64>,
    y: &[usize],
    n_classes: usize,
    indices: &mut [usize],
    config: &DecisionTreeConfig,
) -> TreeParams {
    let mut builder = TreeBuilder {
        x,
        y,
        n_classes,
        config,
        max_features: config.max_features.resolve(x.ncols()),
        n_total: indices.len() as f64,
        nodes: Vec::new(),
        importances: vec![0.0; x.ncols()],
        rng: StdRng::seed_from_u64(config.seed),
    };
    builder.build(indices, 0);

    let mut importances = builder.importances;
    normalize(&mut importances);
    TreeParams {
        nodes: builder.nodes,
        n_features: x.ncols(),
        n_classes,
        importances,
    }
}

/// Decision tree classifier (unfitted).
#[derive(Clone, Debug, Default)]
pub struct DecisionTree {
    config: DecisionTreeConfig,
}

impl DecisionTree {
    pub fn new(config: DecisionTreeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecisionTreeConfig {
        &self.config
    }
}

impl Classifier for DecisionTree {
    type Params = TreeParams;
    type Fitted = FittedDecisionTree;

    fn fit(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<Self::Fitted, ModelError> {
        self.config.validate()?;
        check_training_data(x, y, n_classes)?;

        let mut indices: Vec<usize> = (0..x.nrows()).collect();
        let params = grow_tree(x, y, n_classes, &mut indices, &self.config);
        Ok(FittedDecisionTree { params })
    }
}

/// Fitted decision tree.
#[derive(Clone, Debug)]
pub struct FittedDecisionTree {
    params: TreeParams,
}

impl FittedDecisionTree {
    pub fn depth(&self) -> usize {
        self.params.depth()
    }

    pub fn n_leaves(&self) -> usize {
        self.params.n_leaves()
    }
}

impl FittedClassifier for FittedDecisionTree {
    type Params = TreeParams;

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        check_features(x, self.params.n_features)?;
        let mut proba = Array2::zeros((x.nrows(), self.params.n_classes));
        for (sample, mut out) in x.rows().into_iter().zip(proba.rows_mut()) {
            for (o, &p) in out.iter_mut().zip(self.params.leaf_distribution(sample)) {
                *o = p;
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

    fn feature_importances(&self) -> Option<Array1<f64>> {
        Some(Array1::from(self.params.importances.clone()))
    }

    fn extract_params(&self) -> Self::Params {
        self.params.clone()
    }

    fn from_params(params: Self::Params) -> Result<Self, ModelError> {
        params.validate()?;
        Ok(Self { params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_gini_and_entropy() {
        assert_abs_diff_eq!(Criterion::Gini.impurity(&[5.0, 5.0], 10.0), 0.5);
        assert_abs_diff_eq!(Criterion::Entropy.impurity(&[5.0, 5.0], 10.0), 1.0);
        assert_eq!(Criterion::Gini.impurity(&[4.0, 0.0], 4.0), 0.0);
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::All.resolve(16), 16);
        assert_eq!(MaxFeatures::Sqrt.resolve(16), 4);
        assert_eq!(MaxFeatures::Log2.resolve(16), 4);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(16), 8);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
    }

    #[test]
    fn test_single_split_threshold() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = [0, 0, 0, 1, 1, 1];
        let fitted = DecisionTree::default().fit(&x, &y, 2).unwrap();

        assert_eq!(fitted.depth(), 1);
        let params = fitted.extract_params();
        match &params.nodes[0] {
            Node::Split { threshold, .. } => assert_abs_diff_eq!(*threshold, 6.5),
            other => panic!("expected split, got {other:?}"),
        }
        assert_eq!(
            fitted.predict(&array![[0.0], [6.4], [6.6], [50.0]]).unwrap(),
            vec![0, 0, 1, 1]
        );
    }

    #[test]
    fn test_fits_xor() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = [0, 1, 1, 0];
        let fitted = DecisionTree::default().fit(&x, &y, 2).unwrap();
        assert_eq!(fitted.predict(&x).unwrap(), y.to_vec());
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = [0, 1, 1, 0];
        let config = DecisionTreeConfig {
            max_depth: Some(1),
            ..Default::default()
        };
        let fitted = DecisionTree::new(config).fit(&x, &y, 2).unwrap();
        assert!(fitted.depth() <= 1);

        let proba = fitted.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_min_samples_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = [0, 1, 1, 1, 1];
        let config = DecisionTreeConfig {
            min_samples_leaf: 2,
            ..Default::default()
        };
        let fitted = DecisionTree::new(config).fit(&x, &y, 2).unwrap();
        let proba = fitted.predict_proba(&array![[1.0]]).unwrap();
        // The lone class-0 sample cannot be isolated.
        assert!(proba[[0, 0]] < 1.0);
    }

    #[test]
    fn test_importances_favor_informative_feature() {
        let x = array![
            [0.1, 5.0],
            [0.2, 3.0],
            [0.3, 5.0],
            [0.7, 3.0],
            [0.8, 5.0],
            [0.9, 3.0]
        ];
        let y = [0, 0, 0, 1, 1, 1];
        let fitted = DecisionTree::default().fit(&x, &y, 2).unwrap();
        let importances = fitted.feature_importances().unwrap();
        assert_abs_diff_eq!(importances[0], 1.0);
        assert_abs_diff_eq!(importances.sum(), 1.0);
    }

    #[test]
    fn test_constant_features_do_not_stop_the_split_search() {
        // Only the last feature varies; one feature is drawn per node.
        let x = array![
            [1.0, 7.0, 0.1],
            [1.0, 7.0, 0.2],
            [1.0, 7.0, 0.3],
            [1.0, 7.0, 0.8],
            [1.0, 7.0, 0.9],
            [1.0, 7.0, 1.0]
        ];
        let y = [0, 0, 0, 1, 1, 1];
        for seed in 0..10 {
            let config = DecisionTreeConfig {
                max_features: MaxFeatures::Fraction(0.34),
                seed,
                ..Default::default()
            };
            let fitted = DecisionTree::new(config).fit(&x, &y, 2).unwrap();
            assert_eq!(fitted.depth(), 1, "seed {seed}");
            assert_eq!(fitted.predict(&x).unwrap(), y.to_vec());
        }
    }

    #[test]
    fn test_multiclass_proba() {
        let x = array![[0.0], [1.0], [5.0], [6.0], [10.0], [11.0]];
        let y = [0, 0, 1, 1, 2, 2];
        let fitted = DecisionTree::default().fit(&x, &y, 3).unwrap();
        assert_eq!(fitted.n_classes(), 3);
        assert_eq!(fitted.predict(&array![[10.5]]).unwrap(), vec![2]);
    }

    #[test]
    fn test_invalid_config() {
        let config = DecisionTreeConfig {
            min_samples_split: 1,
            ..Default::default()
        };
        let x = array![[0.0], [1.0]];
        assert!(matches!(
            DecisionTree::new(config).fit(&x, &[0, 1], 2),
            Err(ModelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_save_load() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0]];
        let y = [0, 0, 1, 1];
        let fitted = DecisionTree::default().fit(&x, &y, 2).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.bin");
        fitted.save_to_file(&path).unwrap();
        let loaded = FittedDecisionTree::load_from_file(&path).unwrap();
        assert_eq!(loaded.predict_proba(&x).unwrap(), fitted.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_from_params_rejects_cycles() {
        let params = TreeParams {
            nodes: vec![Node::Split {
                feature: 0,
                threshold: 0.0,
                left: 0,
                right: 0,
            }],
            n_features: 1,
            n_classes: 2,
            importances: vec![1.0],
        };
        assert!(FittedDecisionTree::from_params(params).is_err());
    }
}
