//! Confusion matrix and per-class precision / recall / F1.

use crate::model::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `matrix[true][predicted]` counts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn from_predictions(
        y_true: &[usize],
        y_pred: &[usize],
        n_classes: usize,
    ) -> Result<Self, ModelError> {
        if y_true.len() != y_pred.len() {
            return Err(ModelError::ShapeMismatch {
                rows: y_pred.len(),
                labels: y_true.len(),
            });
        }
        let mut matrix = vec![vec![0; n_classes]; n_classes];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if let Some(&label) = [t, p].iter().find(|&&l| l >= n_classes) {
                return Err(ModelError::InvalidLabel { label, n_classes });
            }
            matrix[t][p] += 1;
        }
        Ok(Self { matrix })
    }

    pub fn matrix(&self) -> &[Vec<usize>] {
        &self.matrix
    }

    pub fn n_classes(&self) -> usize {
        self.matrix.len()
    }

    pub fn get(&self, true_label: usize, predicted: usize) -> usize {
        self.matrix[true_label][predicted]
    }

    pub fn true_positives(&self, class: usize) -> usize {
        self.matrix[class][class]
    }

    /// Predicted as `class` but labelled otherwise.
    pub fn false_positives(&self, class: usize) -> usize {
        (0..self.n_classes())
            .filter(|&i| i != class)
            .map(|i| self.matrix[i][class])
            .sum()
    }

    /// Labelled `class` but predicted otherwise.
    pub fn false_negatives(&self, class: usize) -> usize {
        self.support(class) - self.true_positives(class)
    }

    pub fn support(&self, class: usize) -> usize {
        self.matrix[class].iter().sum()
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    /// Fraction of correct predictions; 0 for an empty matrix.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.n_classes()).map(|i| self.matrix[i][i]).sum();
        correct as f64 / total as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for j in 0..self.n_classes() {
            write!(f, " {:>7}", format!("pred {j}"))?;
        }
        writeln!(f)?;
        for (i, row) in self.matrix.iter().enumerate() {
            write!(f, "{:>8}", format!("true {i}"))?;
            for count in row {
                write!(f, " {:>7}", count)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Precision, recall and F1 of one class (or one average).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class scores plus macro and support-weighted averages.
///
/// Undefined ratios (no predictions, or no samples of a class) count as 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub per_class: Vec<ClassScores>,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
}

impl ClassificationMetrics {
    /// `class_names[k]` labels class code `k`.
    pub fn from_confusion<S: AsRef<str>>(cm: &ConfusionMatrix, class_names: &[S]) -> Self {
        let ratio = |num: usize, den: usize| {
            if den > 0 {
                num as f64 / den as f64
            } else {
                0.0
            }
        };

        let per_class: Vec<ClassScores> = (0..cm.n_classes())
            .map(|k| {
                let tp = cm.true_positives(k);
                let precision = ratio(tp, tp + cm.false_positives(k));
                let recall = ratio(tp, cm.support(k));
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassScores {
                    label: class_names
                        .get(k)
                        .map(|s| s.as_ref().to_string())
                        .unwrap_or_else(|| k.to_string()),
                    precision,
                    recall,
                    f1,
                    support: cm.support(k),
                }
            })
            .collect();

        let total = cm.total();
        let n = per_class.len().max(1) as f64;
        let macro_avg = ClassScores {
            label: "macro avg".to_string(),
            precision: per_class.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: per_class.iter().map(|c| c.recall).sum::<f64>() / n,
            f1: per_class.iter().map(|c| c.f1).sum::<f64>() / n,
            support: total,
        };
        let weighted = |get: fn(&ClassScores) -> f64| {
            if total == 0 {
                0.0
            } else {
                per_class
                    .iter()
                    .map(|c| get(c) * c.support as f64)
                    .sum::<f64>()
                    / total as f64
            }
        };
        let weighted_avg = ClassScores {
            label: "weighted avg".to_string(),
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1: weighted(|c| c.f1),
            support: total,
        };

        Self {
            accuracy: cm.accuracy(),
            per_class,
            macro_avg,
            weighted_avg,
        }
    }

    /// Text table in the usual `precision recall f1-score support` layout.
    pub fn report(&self) -> String {
        let width = self
            .per_class
            .iter()
            .map(|c| c.label.len())
            .chain([12])
            .max()
            .unwrap_or(12);
        let line = |c: &ClassScores| {
            format!(
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
                c.label, c.precision, c.recall, c.f1, c.support
            )
        };

        let mut out = format!(
            "{:>width$} {:>10} {:>10} {:>10} {:>10}\n\n",
            "", "precision", "recall", "f1-score", "support"
        );
        for class in &self.per_class {
            out.push_str(&line(class));
        }
        out.push('\n');
        out.push_str(&format!(
            "{:>width$} {:>10} {:>10} {:>10.2} {:>10}\n",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        ));
        out.push_str(&line(&self.macro_avg));
        out.push_str(&line(&self.weighted_avg));
        out
    }
}
