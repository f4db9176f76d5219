//! Kernel support vector classifier.
//!
//! Each binary machine solves the soft-margin dual
//!
//! ```text
//! min  ½ αᵀQα − Σα    s.t.  0 ≤ α ≤ C,  yᵀα = 0,   Q_ij = y_i y_j K(x_i, x_j)
//! ```
//!
//! with sequential minimal optimization: every step picks the maximal
//! violating pair using second-order information and solves the two-variable
//! subproblem analytically. The decision function is
//! `f(x) = Σ α_i y_i K(x_i, x) − ρ`.
//!
//! Two-class problems train a single machine with class 1 as the positive
//! side. More classes use one-vs-rest. Probabilities squash the decision
//! values through a logistic and normalize them across classes.

use crate::model::error::ModelError;
use crate::model::{check_features, check_training_data, sigmoid, Classifier, FittedClassifier};
use ndarray::{Array2, ArrayView1, Axis};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tracing::{debug, warn};

/// Curvature used when the kernel pair is not positive definite.
const TAU: f64 = 1e-12;

/// Kernel function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    Linear,
    #[default]
    Rbf,
}

/// RBF kernel width.
///
/// Written as `scale`, `auto` or a positive number in config files.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Gamma {
    /// `1 / (n_features * var(X))`, computed on the training matrix.
    #[default]
    Scale,
    /// `1 / n_features`.
    Auto,
    Value(f64),
}

impl Serialize for Gamma {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Gamma::Scale => serializer.serialize_str("scale"),
            Gamma::Auto => serializer.serialize_str("auto"),
            Gamma::Value(g) => serializer.serialize_f64(*g),
        }
    }
}

impl<'de> Deserialize<'de> for Gamma {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NumOrStr {
            Num(f64),
            Str(String),
        }

        match NumOrStr::deserialize(deserializer)? {
            NumOrStr::Num(g) => Ok(Gamma::Value(g)),
            NumOrStr::Str(s) => match s.as_str() {
                "scale" => Ok(Gamma::Scale),
                "auto" => Ok(Gamma::Auto),
                other => Err(de::Error::custom(format!(
                    "gamma must be `scale`, `auto` or a number, got `{other}`"
                ))),
            },
        }
    }
}

impl Gamma {
    fn resolve(&self, x: &Array2<f64>) -> f64 {
        let n_features = x.ncols() as f64;
        match self {
            Gamma::Scale => {
                let var = x.var(0.0);
                if var > 0.0 {
                    1.0 / (n_features * var)
                } else {
                    1.0
                }
            }
            Gamma::Auto => 1.0 / n_features,
            Gamma::Value(g) => *g,
        }
    }
}

/// SVM hyperparameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SvmConfig {
    /// Regularization strength; larger values penalize margin violations more.
    pub c: f64,
    pub kernel: Kernel,
    pub gamma: Gamma,
    /// Stopping tolerance on the maximal KKT violation.
    pub tol: f64,
    /// Upper bound on solver iterations per binary machine.
    pub max_iter: usize,
    /// Kernel row cache size in megabytes.
    pub cache_mb: usize,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: Kernel::Rbf,
            gamma: Gamma::Scale,
            tol: 1e-3,
            max_iter: 1_000_000,
            cache_mb: 200,
        }
    }
}

impl SvmConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err(ModelError::InvalidParameter(format!(
                "c must be positive, got {}",
                self.c
            )));
        }
        if !(self.tol > 0.0) {
            return Err(ModelError::InvalidParameter(format!(
                "tol must be positive, got {}",
                self.tol
            )));
        }
        if let Gamma::Value(g) = self.gamma {
            if !(g > 0.0 && g.is_finite()) {
                return Err(ModelError::InvalidParameter(format!(
                    "gamma must be positive, got {}",
                    g
                )));
            }
        }
        if self.max_iter == 0 {
            return Err(ModelError::InvalidParameter(
                "max_iter must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A kernel with its resolved parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KernelFn {
    pub kernel: Kernel,
    pub gamma: f64,
}

impl KernelFn {
    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self.kernel {
            Kernel::Linear => a.dot(&b),
            Kernel::Rbf => {
                let dist: f64 = a.iter().zip(b.iter()).map(|(p, q)| (p - q).powi(2)).sum();
                (-self.gamma * dist).exp()
            }
        }
    }
}

/// Kernel rows computed on demand, with FIFO eviction.
struct KernelCache<'a> {
    x: &'a Array2<f64>,
    kernel: KernelFn,
    rows: HashMap<usize, Rc<[f64]>>,
    order: VecDeque<usize>,
    capacity: usize,
}

impl<'a> KernelCache<'a> {
    fn new(x: &'a Array2<f64>, kernel: KernelFn, cache_mb: usize) -> Self {
        let row_bytes = (x.nrows() * std::mem::size_of::<f64>()).max(1);
        let capacity = (cache_mb * 1024 * 1024 / row_bytes).max(2);
        Self {
            x,
            kernel,
            rows: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn row(&mut self, i: usize) -> Rc<[f64]> {
        if let Some(row) = self.rows.get(&i) {
            return Rc::clone(row);
        }
        let xi = self.x.row(i);
        let row: Rc<[f64]> = self
            .x
            .rows()
            .into_iter()
            .map(|xj| self.kernel.eval(xi, xj))
            .collect();
        if self.order.len() >= self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.rows.remove(&old);
            }
        }
        self.order.push_back(i);
        self.rows.insert(i, Rc::clone(&row));
        row
    }
}

/// One trained two-class machine, keeping only its support vectors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinaryMachine {
    /// Row-major support vectors.
    pub support_vectors: Vec<f64>,
    /// `α_i y_i` for each support vector.
    pub dual_coef: Vec<f64>,
    pub rho: f64,
}

struct SolveResult {
    alpha: Vec<f64>,
    rho: f64,
    iterations: usize,
    converged: bool,
}

/// SMO with second-order working set selection. `y` holds ±1.
fn solve(x: &Array2<f64>, y: &[f64], kernel: KernelFn, config: &SvmConfig) -> SolveResult {
    let n = y.len();
    let c = config.c;
    let mut cache = KernelCache::new(x, kernel, config.cache_mb);
    let diag: Vec<f64> = x.rows().into_iter().map(|r| kernel.eval(r, r)).collect();

    let mut alpha = vec![0.0; n];
    let mut grad = vec![-1.0; n];

    let in_up = |a: f64, yt: f64| (yt > 0.0 && a < c) || (yt < 0.0 && a > 0.0);
    let in_low = |a: f64, yt: f64| (yt > 0.0 && a > 0.0) || (yt < 0.0 && a < c);

    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.max_iter {
        // i: maximal violator from the "up" set.
        let mut g_max = f64::NEG_INFINITY;
        let mut i = usize::MAX;
        for t in 0..n {
            if in_up(alpha[t], y[t]) && -y[t] * grad[t] >= g_max {
                g_max = -y[t] * grad[t];
                i = t;
            }
        }
        if i == usize::MAX {
            converged = true;
            break;
        }

        // j: best second-order partner from the "low" set.
        let k_i = cache.row(i);
        let mut g_min = f64::INFINITY;
        let mut best_obj = f64::INFINITY;
        let mut j = usize::MAX;
        for t in 0..n {
            if !in_low(alpha[t], y[t]) {
                continue;
            }
            let yg = -y[t] * grad[t];
            g_min = g_min.min(yg);
            let b = g_max - yg;
            if b > 0.0 {
                let mut a = diag[i] + diag[t] - 2.0 * k_i[t];
                if a <= 0.0 {
                    a = TAU;
                }
                let obj = -(b * b) / a;
                if obj <= best_obj {
                    best_obj = obj;
                    j = t;
                }
            }
        }
        if g_max - g_min < config.tol || j == usize::MAX {
            converged = true;
            break;
        }
        iterations += 1;

        let k_j = cache.row(j);
        let (old_i, old_j) = (alpha[i], alpha[j]);
        let mut quad = diag[i] + diag[j] - 2.0 * k_i[j];
        if quad <= 0.0 {
            quad = TAU;
        }

        if y[i] != y[j] {
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;
            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > 0.0 {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = c - diff;
                }
            } else if alpha[j] > c {
                alpha[j] = c;
                alpha[i] = c + diff;
            }
        } else {
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;
            if sum > c {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = sum - c;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c {
                if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = sum - c;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let d_i = alpha[i] - old_i;
        let d_j = alpha[j] - old_j;
        for t in 0..n {
            grad[t] += y[t] * (y[i] * k_i[t] * d_i + y[j] * k_j[t] * d_j);
        }
    }

    // ρ: average over free vectors, else midpoint of the feasible interval.
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free_sum = 0.0;
    let mut n_free = 0usize;
    for t in 0..n {
        let yg = y[t] * grad[t];
        if alpha[t] >= c {
            if y[t] < 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else if alpha[t] <= 0.0 {
            if y[t] > 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else {
            n_free += 1;
            free_sum += yg;
        }
    }
    let rho = if n_free > 0 {
        free_sum / n_free as f64
    } else {
        (upper + lower) / 2.0
    };

    SolveResult {
        alpha,
        rho,
        iterations,
        converged,
    }
}

fn train_machine(
    x: &Array2<f64>,
    y: &[f64],
    kernel: KernelFn,
    config: &SvmConfig,
) -> BinaryMachine {
    let result = solve(x, y, kernel, config);
    if !result.converged {
        warn!(
            iterations = result.iterations,
            "SVM solver reached max_iter before converging"
        );
    }

    let support: Vec<usize> = (0..y.len()).filter(|&t| result.alpha[t] > 0.0).collect();
    debug!(
        iterations = result.iterations,
        support_vectors = support.len(),
        rho = result.rho,
        "trained binary SVM"
    );

    let mut support_vectors = Vec::with_capacity(support.len() * x.ncols());
    for &t in &support {
        support_vectors.extend(x.row(t).iter().copied());
    }
    BinaryMachine {
        support_vectors,
        dual_coef: support.iter().map(|&t| result.alpha[t] * y[t]).collect(),
        rho: result.rho,
    }
}

/// Serializable parameters of a fitted SVM.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    pub kernel: KernelFn,
    /// One machine for two classes, otherwise one per class.
    pub machines: Vec<BinaryMachine>,
    pub n_features: usize,
    pub n_classes: usize,
}

/// Support vector classifier (unfitted).
#[derive(Clone, Debug, Default)]
pub struct Svm {
    config: SvmConfig,
}

impl Svm {
    pub fn new(config: SvmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SvmConfig {
        &self.config
    }
}

impl Classifier for Svm {
    type Params = SvmParams;
    type Fitted = FittedSvm;

    fn fit(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<Self::Fitted, ModelError> {
        self.config.validate()?;
        check_training_data(x, y, n_classes)?;

        let kernel = KernelFn {
            kernel: self.config.kernel,
            gamma: self.config.gamma.resolve(x),
        };

        let positives: Vec<usize> = if n_classes == 2 {
            vec![1]
        } else {
            (0..n_classes).collect()
        };
        let machines = positives
            .into_iter()
            .map(|class| {
                let signs: Vec<f64> = y
                    .iter()
                    .map(|&label| if label == class { 1.0 } else { -1.0 })
                    .collect();
                train_machine(x, &signs, kernel, &self.config)
            })
            .collect();

        FittedSvm::from_params(SvmParams {
            kernel,
            machines,
            n_features: x.ncols(),
            n_classes,
        })
    }
}

/// Fitted support vector classifier.
#[derive(Clone, Debug)]
pub struct FittedSvm {
    params: SvmParams,
    support_vectors: Vec<Array2<f64>>,
}

impl FittedSvm {
    /// Raw decision values: one column for two classes, else one per class.
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        check_features(x, self.params.n_features)?;
        let kernel = self.params.kernel;
        let mut out = Array2::zeros((x.nrows(), self.params.machines.len()));
        for (m, (machine, svs)) in self
            .params
            .machines
            .iter()
            .zip(&self.support_vectors)
            .enumerate()
        {
            for (i, sample) in x.rows().into_iter().enumerate() {
                let value: f64 = svs
                    .rows()
                    .into_iter()
                    .zip(&machine.dual_coef)
                    .map(|(sv, &coef)| coef * kernel.eval(sv, sample))
                    .sum();
                out[[i, m]] = value - machine.rho;
            }
        }
        Ok(out)
    }

    pub fn n_support(&self) -> Vec<usize> {
        self.support_vectors.iter().map(|s| s.nrows()).collect()
    }

    pub fn gamma(&self) -> f64 {
        self.params.kernel.gamma
    }
}

impl FittedClassifier for FittedSvm {
    type Params = SvmParams;

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        let decision = self.decision_function(x)?;
        if self.params.n_classes == 2 {
            let mut proba = Array2::zeros((x.nrows(), 2));
            for (i, &f) in decision.column(0).iter().enumerate() {
                let p = sigmoid(f);
                proba[[i, 0]] = 1.0 - p;
                proba[[i, 1]] = p;
            }
            return Ok(proba);
        }

        let mut proba = decision.mapv(sigmoid);
        for mut row in proba.axis_iter_mut(Axis(0)) {
            let total = row.sum();
            if total > 0.0 {
                row /= total;
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

    fn extract_params(&self) -> Self::Params {
        self.params.clone()
    }

    fn from_params(params: Self::Params) -> Result<Self, ModelError> {
        let expected_machines = if params.n_classes == 2 {
            1
        } else {
            params.n_classes
        };
        if params.n_classes < 2 || params.machines.len() != expected_machines {
            return Err(ModelError::Serialization(format!(
                "{} machines for {} classes",
                params.machines.len(),
                params.n_classes
            )));
        }
        let mut support_vectors = Vec::with_capacity(params.machines.len());
        for machine in &params.machines {
            let n_sv = machine.dual_coef.len();
            let svs = Array2::from_shape_vec(
                (n_sv, params.n_features),
                machine.support_vectors.clone(),
            )
            .map_err(|e| ModelError::Serialization(e.to_string()))?;
            support_vectors.push(svs);
        }
        Ok(Self {
            params,
            support_vectors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn linear_data() -> (Array2<f64>, Vec<usize>) {
        let x = array![
            [-2.0, -1.0],
            [-1.5, -2.0],
            [-3.0, -2.5],
            [-2.2, -0.5],
            [2.0, 1.0],
            [1.5, 2.5],
            [3.0, 1.5],
            [2.5, 0.5]
        ];
        (x, vec![0, 0, 0, 0, 1, 1, 1, 1])
    }

    #[test]
    fn test_linear_svm_separates() {
        let (x, y) = linear_data();
        let config = SvmConfig {
            kernel: Kernel::Linear,
            ..Default::default()
        };
        let fitted = Svm::new(config).fit(&x, &y, 2).unwrap();
        assert_eq!(fitted.predict(&x).unwrap(), y);

        let scores = fitted
            .decision_function(&array![[-5.0, -5.0], [5.0, 5.0]])
            .unwrap();
        assert!(scores[[0, 0]] < 0.0 && scores[[1, 0]] > 0.0);
    }

    #[test]
    fn test_hard_margin_two_points() {
        // Support vectors at ±1 on a line: w = 1, ρ = 0, margin points at f = ±1.
        let x = array![[-1.0], [1.0]];
        let config = SvmConfig {
            kernel: Kernel::Linear,
            c: 100.0,
            tol: 1e-6,
            ..Default::default()
        };
        let fitted = Svm::new(config).fit(&x, &[0, 1], 2).unwrap();
        let f = fitted.decision_function(&array![[-1.0], [0.0], [1.0]]).unwrap();
        assert_abs_diff_eq!(f[[0, 0]], -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(f[[1, 0]], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(f[[2, 0]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rbf_svm_fits_ring() {
        // Inner cluster vs. outer ring: not linearly separable.
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for k in 0..16 {
            let angle = k as f64 * std::f64::consts::PI / 8.0;
            rows.extend([0.3 * angle.cos(), 0.3 * angle.sin()]);
            y.push(0);
            rows.extend([2.0 * angle.cos(), 2.0 * angle.sin()]);
            y.push(1);
        }
        let x = Array2::from_shape_vec((32, 2), rows).unwrap();
        let fitted = Svm::new(SvmConfig {
            c: 10.0,
            ..Default::default()
        })
        .fit(&x, &y, 2)
        .unwrap();
        assert_eq!(fitted.predict(&x).unwrap(), y);
        assert_eq!(fitted.predict(&array![[0.0, 0.0], [0.0, 2.5]]).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_gamma_scale() {
        let x = array![[0.0, 2.0], [2.0, 0.0]];
        // var over all entries = 1, two features
        assert_abs_diff_eq!(Gamma::Scale.resolve(&x), 0.5);
        assert_abs_diff_eq!(Gamma::Auto.resolve(&x), 0.5);
        assert_eq!(Gamma::Value(0.1).resolve(&x), 0.1);
        assert_eq!(Gamma::Scale.resolve(&Array2::ones((3, 2))), 1.0);
    }

    #[test]
    fn test_multiclass_one_vs_rest() {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [5.0, 0.0],
            [5.2, 0.1],
            [0.0, 5.0],
            [0.1, 5.2]
        ];
        let y = vec![0, 0, 1, 1, 2, 2];
        let fitted = Svm::default().fit(&x, &y, 3).unwrap();
        assert_eq!(fitted.n_support().len(), 3);
        assert_eq!(fitted.predict(&x).unwrap(), y);

        let proba = fitted.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_binary_proba_matches_decision_sign() {
        let (x, y) = linear_data();
        let fitted = Svm::default().fit(&x, &y, 2).unwrap();
        let proba = fitted.predict_proba(&x).unwrap();
        let decision = fitted.decision_function(&x).unwrap();
        for i in 0..x.nrows() {
            assert_eq!(proba[[i, 1]] > 0.5, decision[[i, 0]] > 0.0);
        }
    }

    #[test]
    fn test_invalid_c() {
        let (x, y) = linear_data();
        let config = SvmConfig {
            c: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            Svm::new(config).fit(&x, &y, 2),
            Err(ModelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_tiny_cache_still_converges() {
        let (x, y) = linear_data();
        let config = SvmConfig {
            cache_mb: 0,
            ..Default::default()
        };
        let fitted = Svm::new(config).fit(&x, &y, 2).unwrap();
        assert_eq!(fitted.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_save_load() {
        let (x, y) = linear_data();
        let fitted = Svm::default().fit(&x, &y, 2).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svm.bin");
        fitted.save_to_file(&path).unwrap();
        let loaded = FittedSvm::load_from_file(&path).unwrap();
        assert_eq!(
            loaded.decision_function(&x).unwrap(),
            fitted.decision_function(&x).unwrap()
        );
    }
}
