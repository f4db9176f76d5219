//! Binary ROC curve and area under it.

use serde::{Deserialize, Serialize};

/// One operating point. Samples with `score >= threshold` are predicted positive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
    /// `None` for the initial point where nothing is predicted positive.
    pub threshold: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub positive_class: String,
    pub points: Vec<RocPoint>,
    pub auc: f64,
}

/// ROC points for `scores` of the positive class, one per distinct score.
///
/// Returns `None` when `positives` has only one class, since one of the rates is
/// then undefined.
pub fn roc_curve(scores: &[f64], positives: &[bool]) -> Option<Vec<RocPoint>> {
    let n_pos = positives.iter().filter(|&&p| p).count();
    let n_neg = positives.len() - n_pos;
    if n_pos == 0 || n_neg == 0 || scores.len() != positives.len() {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = vec![RocPoint {
        fpr: 0.0,
        tpr: 0.0,
        threshold: None,
    }];
    let (mut tp, mut fp) = (0usize, 0usize);
    for (pos, &i) in order.iter().enumerate() {
        if positives[i] {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_score = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_score {
            points.push(RocPoint {
                fpr: fp as f64 / n_neg as f64,
                tpr: tp as f64 / n_pos as f64,
                threshold: Some(scores[i]),
            });
        }
    }
    Some(points)
}

/// Trapezoidal area under a curve whose points are sorted by `fpr`.
pub fn auc(points: &[RocPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_perfect_ranking() {
        let points = roc_curve(&[0.9, 0.8, 0.3, 0.1], &[true, true, false, false]).unwrap();
        assert_abs_diff_eq!(auc(&points), 1.0);
        assert_eq!(points.last().map(|p| (p.fpr, p.tpr)), Some((1.0, 1.0)));
    }

    #[test]
    fn test_known_auc() {
        // one of four positive/negative pairs is misordered
        let points = roc_curve(&[0.1, 0.4, 0.35, 0.8], &[false, false, true, true]).unwrap();
        assert_abs_diff_eq!(auc(&points), 0.75);
        assert_eq!(points.len(), 5);
    }

    #[test]
    fn test_tied_scores_share_a_point() {
        let points = roc_curve(&[0.5, 0.5, 0.5, 0.5], &[true, false, true, false]).unwrap();
        assert_eq!(points.len(), 2);
        assert_abs_diff_eq!(auc(&points), 0.5);
    }

    #[test]
    fn test_single_class_is_undefined() {
        assert!(roc_curve(&[0.2, 0.7], &[true, true]).is_none());
    }
}
