//! Model evaluation.
//!
//! [`evaluate`] scores a fitted classifier on a held-out split and collects
//! everything a notebook would plot (confusion matrix, ROC curve, feature
//! importances) as plain data in an [`EvaluationReport`], which serializes to
//! JSON.

pub mod confusion;
pub mod roc;

pub use confusion::{ClassScores, ClassificationMetrics, ConfusionMatrix};
pub use roc::{auc, roc_curve, RocCurve, RocPoint};

use crate::model::{FittedClassifier, ModelError};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Importance of one input feature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Pair names with importances, most important first (ties by name).
pub fn rank_importances<S: AsRef<str>>(names: &[S], importances: &[f64]) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(importances)
        .map(|(name, &importance)| FeatureImportance {
            feature: name.as_ref().to_string(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.importance
            .total_cmp(&a.importance)
            .then_with(|| a.feature.cmp(&b.feature))
    });
    ranked
}

/// Held-out evaluation of one model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model: String,
    pub n_samples: usize,
    pub classes: Vec<String>,
    pub metrics: ClassificationMetrics,
    pub confusion_matrix: ConfusionMatrix,
    /// Present for two-class problems with both classes in the evaluation set.
    pub roc: Option<RocCurve>,
    /// Empty for models without importances.
    pub feature_importances: Vec<FeatureImportance>,
}

impl EvaluationReport {
    pub fn accuracy(&self) -> f64 {
        self.metrics.accuracy
    }

    pub fn macro_f1(&self) -> f64 {
        self.metrics.macro_avg.f1
    }

    /// Human-readable summary: classification report, confusion matrix, AUC
    /// and the top `top_features` importances.
    pub fn render(&self, top_features: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "model: {} ({} samples)", self.model, self.n_samples);
        let _ = writeln!(out);
        out.push_str(&self.metrics.report());
        let _ = writeln!(out);
        let _ = writeln!(out, "confusion matrix (rows = true, columns = predicted):");
        for (k, class) in self.classes.iter().enumerate() {
            let _ = writeln!(out, "  {k}: {class}");
        }
        let _ = write!(out, "{}", self.confusion_matrix);
        if let Some(roc) = &self.roc {
            let _ = writeln!(out);
            let _ = writeln!(out, "ROC AUC ({}): {:.4}", roc.positive_class, roc.auc);
        }
        if !self.feature_importances.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "top features:");
            for fi in self.feature_importances.iter().take(top_features) {
                let _ = writeln!(out, "  {:<28} {:.4}", fi.feature, fi.importance);
            }
        }
        out
    }
}

/// Score `model` on `(x, y)`.
///
/// `classes[k]` names class code `k`; `feature_names` label the importance
/// ranking. The ROC curve uses class 1 as the positive class.
pub fn evaluate<M, S>(
    model_name: &str,
    model: &M,
    x: &Array2<f64>,
    y: &[usize],
    classes: &[S],
    feature_names: &[S],
) -> Result<EvaluationReport, ModelError>
where
    M: FittedClassifier,
    S: AsRef<str>,
{
    if classes.len() != model.n_classes() {
        return Err(ModelError::InvalidParameter(format!(
            "{} class names for a model with {} classes",
            classes.len(),
            model.n_classes()
        )));
    }
    let proba = model.predict_proba(x)?;
    let predicted: Vec<usize> = proba
        .rows()
        .into_iter()
        .map(|row| crate::model::argmax(row.iter()))
        .collect();
    let cm = ConfusionMatrix::from_predictions(y, &predicted, model.n_classes())?;
    let metrics = ClassificationMetrics::from_confusion(&cm, classes);

    let roc = if model.n_classes() == 2 {
        let scores = proba.column(1).to_vec();
        let positives: Vec<bool> = y.iter().map(|&label| label == 1).collect();
        roc_curve(&scores, &positives).map(|points| RocCurve {
            positive_class: classes[1].as_ref().to_string(),
            auc: auc(&points),
            points,
        })
    } else {
        None
    };

    let feature_importances = model
        .feature_importances()
        .map(|imp| rank_importances(feature_names, imp.as_slice().unwrap_or(&[])))
        .unwrap_or_default();

    Ok(EvaluationReport {
        model: model_name.to_string(),
        n_samples: y.len(),
        classes: classes.iter().map(|c| c.as_ref().to_string()).collect(),
        metrics,
        confusion_matrix: cm,
        roc,
        feature_importances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classifier, RandomForest, RandomForestConfig};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_rank_importances() {
        let ranked = rank_importances(&["b", "a", "c"], &[0.2, 0.2, 0.6]);
        let names: Vec<&str> = ranked.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_evaluate_forest() {
        let x = array![[0.0, 1.0], [0.1, 0.0], [0.2, 1.0], [1.0, 0.0], [1.1, 1.0], [1.2, 0.0]];
        let y = vec![0, 0, 0, 1, 1, 1];
        let model = RandomForest::new(RandomForestConfig {
            n_estimators: 10,
            bootstrap: false,
            max_features: crate::model::MaxFeatures::All,
            ..Default::default()
        })
        .fit(&x, &y, 2)
        .unwrap();

        let classes = ["candidate".to_string(), "false positive".to_string()];
        let features = ["koi_depth".to_string(), "koi_period".to_string()];
        let report = evaluate("random_forest", &model, &x, &y, &classes, &features).unwrap();

        assert_abs_diff_eq!(report.accuracy(), 1.0);
        assert_abs_diff_eq!(report.roc.as_ref().unwrap().auc, 1.0);
        assert_eq!(report.feature_importances[0].feature, "koi_depth");
        assert_eq!(report.confusion_matrix.get(1, 1), 3);

        let json = serde_json::to_string(&report).unwrap();
        let back: EvaluationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.classes, report.classes);
        assert!(report.render(5).contains("ROC AUC (false positive)"));
    }

    #[test]
    fn test_evaluate_class_name_count() {
        let x = array![[0.0], [1.0]];
        let model = RandomForest::new(RandomForestConfig {
            n_estimators: 2,
            ..Default::default()
        })
        .fit(&x, &[0, 1], 2)
        .unwrap();
        let classes = ["only".to_string()];
        let features = ["f".to_string()];
        assert!(matches!(
            evaluate("rf", &model, &x, &[0, 1], &classes, &features),
            Err(ModelError::InvalidParameter(_))
        ));
    }
}
