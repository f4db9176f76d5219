//! Cross-validated hyperparameter search.
//!
//! Every candidate [`ModelSpec`] is fitted on the training folds and scored on
//! the held-out fold of a [`StratifiedKFold`]. All candidates see the same
//! folds. The best candidate has the highest mean score; earlier candidates
//! win ties.

use crate::dataset::{InMemoryDataset, StratifiedKFold};
use crate::error::{Error, Result};
use crate::metrics::{ClassificationMetrics, ConfusionMatrix};
use crate::model::{Classifier, FittedClassifier, ModelSpec};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Score used to rank candidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    #[default]
    Accuracy,
    MacroF1,
}

impl Scoring {
    fn score(&self, y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Result<f64> {
        let cm = ConfusionMatrix::from_predictions(y_true, y_pred, n_classes)?;
        Ok(match self {
            Scoring::Accuracy => cm.accuracy(),
            Scoring::MacroF1 => {
                let names: Vec<String> = (0..n_classes).map(|k| k.to_string()).collect();
                ClassificationMetrics::from_confusion(&cm, &names).macro_avg.f1
            }
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub n_folds: usize,
    pub scoring: Scoring,
    pub seed: u64,
    pub candidates: Vec<ModelSpec>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_folds: 5,
            scoring: Scoring::Accuracy,
            seed: 42,
            candidates: Vec::new(),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_folds < 2 {
            return Err(Error::Config(format!(
                "search.n_folds must be at least 2, got {}",
                self.n_folds
            )));
        }
        if self.candidates.is_empty() {
            return Err(Error::Config("search has no candidates".to_string()));
        }
        for candidate in &self.candidates {
            candidate.validate()?;
        }
        Ok(())
    }
}

/// Fold scores of one candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub spec: ModelSpec,
    pub fold_scores: Vec<f64>,
    pub mean: f64,
    /// Population standard deviation over folds.
    pub std: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub scoring: Scoring,
    pub candidates: Vec<CandidateScore>,
    pub best: usize,
}

impl SearchResult {
    pub fn best(&self) -> &CandidateScore {
        &self.candidates[self.best]
    }
}

/// Grid search over explicit candidates.
#[derive(Clone, Debug)]
pub struct GridSearch {
    config: SearchConfig,
}

impl GridSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, data: &InMemoryDataset, n_classes: usize) -> Result<SearchResult> {
        self.config.validate()?;
        let folds = StratifiedKFold::new(self.config.n_folds)
            .with_seed(self.config.seed)
            .split(data.y())?;

        let mut candidates = Vec::with_capacity(self.config.candidates.len());
        for spec in &self.config.candidates {
            let mut fold_scores = Vec::with_capacity(folds.len());
            for fold in &folds {
                let train = data.subset(&fold.train);
                let test = data.subset(&fold.test);
                let fitted = spec.fit(train.x(), train.y(), n_classes)?;
                let predicted = fitted.predict(test.x())?;
                fold_scores.push(self.config.scoring.score(test.y(), &predicted, n_classes)?);
            }
            let n = fold_scores.len() as f64;
            let mean = fold_scores.iter().sum::<f64>() / n;
            let std = (fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n).sqrt();
            debug!(kind = %spec.kind(), mean, std, "scored candidate");
            candidates.push(CandidateScore {
                spec: spec.clone(),
                fold_scores,
                mean,
                std,
            });
        }

        let mut best = 0;
        for (idx, candidate) in candidates.iter().enumerate() {
            if candidate.mean > candidates[best].mean {
                best = idx;
            }
        }
        info!(
            candidates = candidates.len(),
            folds = folds.len(),
            best,
            best_score = candidates[best].mean,
            "grid search finished"
        );

        Ok(SearchResult {
            scoring: self.config.scoring,
            candidates,
            best,
        })
    }
}
