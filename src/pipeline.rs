//! End-to-end workflows: load, preprocess, train, evaluate, save.
//!
//! Also hosts the file-level data preparation tasks (train/test CSV split,
//! label standardization and balanced selection) used by the command line.

use crate::artifacts::ArtifactStore;
use crate::config::TrainingConfig;
use crate::dataset::{load_csv, split_table, write_csv, InMemoryDataset};
use crate::disposition::{self, Mission, StandardizeSummary};
use crate::error::{Error, Result};
use crate::metrics::{evaluate, EvaluationReport};
use crate::model::{Classifier, FittedModel, ModelKind, ModelSpec};
use crate::preprocessing::{PreparedData, Preprocessor};
use crate::search::{GridSearch, SearchResult};
use crate::selection::{self, Selection, SelectionConfig};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::info;

/// Result of [`train`].
#[derive(Clone, Debug, Serialize)]
pub struct TrainingReport {
    /// Hyperparameters of the saved model (the search winner when searching).
    pub model: ModelSpec,
    pub n_train: usize,
    pub n_test: usize,
    pub feature_names: Vec<String>,
    pub dropped_columns: Vec<String>,
    pub dropped_rows: usize,
    pub fit_seconds: f64,
    pub search: Option<SearchResult>,
    pub evaluation: EvaluationReport,
    pub output_dir: PathBuf,
}

impl TrainingReport {
    pub fn render(&self, top_features: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "trained {} on {} rows, evaluated on {} rows ({} features, {:.2}s)",
            self.model.kind(),
            self.n_train,
            self.n_test,
            self.feature_names.len(),
            self.fit_seconds
        );
        if let Some(search) = &self.search {
            let _ = writeln!(out, "cross-validated candidates ({:?}):", search.scoring);
            for (idx, candidate) in search.candidates.iter().enumerate() {
                let marker = if idx == search.best { "*" } else { " " };
                let _ = writeln!(
                    out,
                    " {} {:<20} {:.4} +/- {:.4}",
                    marker,
                    candidate.spec.kind().to_string(),
                    candidate.mean,
                    candidate.std
                );
            }
        }
        let _ = writeln!(out);
        out.push_str(&self.evaluation.render(top_features));
        let _ = writeln!(out);
        let _ = writeln!(out, "artifacts written to {}", self.output_dir.display());
        out
    }
}

/// Load the configured CSV and run the preprocessor on it.
pub fn prepare(config: &TrainingConfig) -> Result<PreparedData> {
    let loaded = load_csv(&config.data)?;
    info!(
        path = %config.data.display(),
        rows = loaded.table.n_rows(),
        cols = loaded.table.n_cols(),
        "loaded training data"
    );
    Ok(Preprocessor::new(config.preprocess.clone()).prepare(&loaded.table)?)
}

fn fit_and_evaluate(
    spec: &ModelSpec,
    data: &PreparedData,
) -> Result<(FittedModel, EvaluationReport, f64)> {
    let started = Instant::now();
    let model = spec.fit(&data.x_train, &data.y_train, data.n_classes())?;
    let fit_seconds = started.elapsed().as_secs_f64();
    info!(kind = %spec.kind(), fit_seconds, "fitted model");

    let evaluation = evaluate(
        spec.kind().as_str(),
        &model,
        &data.x_test,
        &data.y_test,
        data.label_encoder.classes(),
        data.feature_names(),
    )?;
    info!(
        kind = %spec.kind(),
        accuracy = evaluation.accuracy(),
        macro_f1 = evaluation.macro_f1(),
        "evaluated on test split"
    );
    Ok((model, evaluation, fit_seconds))
}

/// Train one model, evaluate it on the test split and save its artifacts.
pub fn train(config: &TrainingConfig) -> Result<TrainingReport> {
    config.validate()?;
    let data = prepare(config)?;

    let (spec, search) = match &config.search {
        Some(search_config) => {
            let train = InMemoryDataset::new(data.x_train.clone(), data.y_train.clone())?;
            let result = GridSearch::new(search_config.clone()).run(&train, data.n_classes())?;
            (result.best().spec.clone(), Some(result))
        }
        None => (config.model.clone(), None),
    };

    let (model, evaluation, fit_seconds) = fit_and_evaluate(&spec, &data)?;
    ArtifactStore::new(&config.output_dir).save(
        &model,
        &data.features,
        &data.label_encoder,
        &evaluation,
    )?;

    Ok(TrainingReport {
        model: spec,
        n_train: data.x_train.nrows(),
        n_test: data.x_test.nrows(),
        feature_names: data.feature_names().to_vec(),
        dropped_columns: data.dropped_columns.clone(),
        dropped_rows: data.dropped_rows,
        fit_seconds,
        search,
        evaluation,
        output_dir: config.output_dir.clone(),
    })
}

/// One row of [`ComparisonReport`].
#[derive(Clone, Debug, Serialize)]
pub struct ComparisonRow {
    pub kind: ModelKind,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub weighted_f1: f64,
    pub auc: Option<f64>,
    pub fit_seconds: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ComparisonReport {
    pub rows: Vec<ComparisonRow>,
    pub evaluations: Vec<EvaluationReport>,
}

impl ComparisonReport {
    pub fn render(&self) -> String {
        let mut out = format!(
            "{:<20} {:>9} {:>9} {:>12} {:>8} {:>9}\n",
            "model", "accuracy", "macro f1", "weighted f1", "auc", "fit (s)"
        );
        for row in &self.rows {
            let auc = row
                .auc
                .map_or_else(|| "-".to_string(), |auc| format!("{:.4}", auc));
            let _ = writeln!(
                out,
                "{:<20} {:>9.4} {:>9.4} {:>12.4} {:>8} {:>9.2}",
                row.kind.to_string(),
                row.accuracy,
                row.macro_f1,
                row.weighted_f1,
                auc,
                row.fit_seconds
            );
        }
        out
    }
}

/// Train every model family on the same split.
///
/// The configured `model` supplies the hyperparameters of its own family; the
/// other families use their defaults. Artifacts of each family are saved under
/// `output_dir/<kind>`.
pub fn compare(config: &TrainingConfig) -> Result<ComparisonReport> {
    config.validate()?;
    let data = prepare(config)?;

    let mut rows = Vec::with_capacity(ModelKind::ALL.len());
    let mut evaluations = Vec::with_capacity(ModelKind::ALL.len());
    for kind in ModelKind::ALL {
        let spec = if config.model.kind() == kind {
            config.model.clone()
        } else {
            ModelSpec::default_for(kind)
        };
        let (model, evaluation, fit_seconds) = fit_and_evaluate(&spec, &data)?;
        ArtifactStore::new(config.output_dir.join(kind.as_str())).save(
            &model,
            &data.features,
            &data.label_encoder,
            &evaluation,
        )?;
        rows.push(ComparisonRow {
            kind,
            accuracy: evaluation.accuracy(),
            macro_f1: evaluation.macro_f1(),
            weighted_f1: evaluation.metrics.weighted_avg.f1,
            auc: evaluation.roc.as_ref().map(|roc| roc.auc),
            fit_seconds,
        });
        evaluations.push(evaluation);
    }
    Ok(ComparisonReport { rows, evaluations })
}

/// Row counts written by [`split_file`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SplitSummary {
    pub total: usize,
    pub train: usize,
    pub test: usize,
}

/// Split a CSV into train and test files, keeping its comment preamble.
pub fn split_file(
    input: &Path,
    train_out: &Path,
    test_out: &Path,
    test_size: f64,
    seed: u64,
    stratify_column: Option<&str>,
) -> Result<SplitSummary> {
    let loaded = load_csv(input)?;
    let (train, test) = split_table(&loaded.table, test_size, seed, stratify_column)?;
    write_csv(train_out, &train, &loaded.comments)?;
    write_csv(test_out, &test, &loaded.comments)?;
    let summary = SplitSummary {
        total: loaded.table.n_rows(),
        train: train.n_rows(),
        test: test.n_rows(),
    };
    info!(total = summary.total, train = summary.train, test = summary.test, "split file");
    Ok(summary)
}

/// Standardize the disposition column of a CSV.
///
/// With `output = None` the input is rewritten in place after copying it to
/// `<input>.backup_<unix seconds>`. Nothing is written if any value is unmapped.
pub fn standardize_file(
    input: &Path,
    output: Option<&Path>,
    mission: Mission,
) -> Result<StandardizeSummary> {
    let mut loaded = load_csv(input)?;
    let summary = disposition::standardize(&mut loaded.table, mission)?;

    let target = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let stamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let mut backup = input.as_os_str().to_owned();
            backup.push(format!(".backup_{stamp}"));
            std::fs::copy(input, &backup)?;
            info!(backup = %PathBuf::from(&backup).display(), "created backup");
            input.to_path_buf()
        }
    };
    write_csv(&target, &loaded.table, &loaded.comments)?;
    Ok(summary)
}

/// Write the balanced high-SNR selection of a KOI CSV.
pub fn select_file(input: &Path, output: &Path, config: &SelectionConfig) -> Result<Selection> {
    if config.per_class == 0 {
        return Err(Error::Config("per_class must be at least 1".to_string()));
    }
    let loaded = load_csv(input)?;
    let selection = selection::select_balanced(&loaded.table, config)?;
    let mut comments = loaded.comments.clone();
    comments.extend(selection.comment_lines());
    write_csv(output, &selection.table, &comments)?;
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;
    use std::fs;

    fn write_koi(dir: &Path) -> PathBuf {
        let path = dir.join("koi.csv");
        let mut text = String::from("# KOI table\n# columns documented upstream\n");
        text.push_str("kepoi_name,koi_disposition,koi_period\n");
        for i in 0..10 {
            let label = if i % 2 == 0 { "CONFIRMED" } else { "FALSE POSITIVE" };
            text.push_str(&format!("K{i:05}.01,{label},{}\n", i as f64 + 0.5));
        }
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_split_file_keeps_comments() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_koi(dir.path());
        let train = dir.path().join("train.csv");
        let test = dir.path().join("test.csv");
        let summary = split_file(&input, &train, &test, 0.2, 42, None).unwrap();
        assert_eq!(summary, SplitSummary { total: 10, train: 8, test: 2 });

        let text = fs::read_to_string(&test).unwrap();
        assert!(text.starts_with("# KOI table\n# columns documented upstream\n"));
        assert_eq!(load_csv(&train).unwrap().table.n_rows(), 8);
    }

    #[test]
    fn test_standardize_in_place_makes_backup() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_koi(dir.path());
        let summary = standardize_file(&input, None, Mission::Kepler).unwrap();
        assert_eq!(summary.column, "koi_disposition");

        let table = load_csv(&input).unwrap().table;
        let labels = table.categorical("koi_disposition").unwrap();
        assert_eq!(labels[0].as_deref(), Some("candidate"));
        assert_eq!(labels[1].as_deref(), Some("non-candidate"));

        let backups: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".backup_"))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn test_standardize_unmapped_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_koi(dir.path());
        let output = dir.path().join("out.csv");
        let result = standardize_file(&input, Some(&output), Mission::Tess);
        assert!(result.is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_select_file_appends_comment() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("koi.csv");
        let table = crate::dataset::FeatureTable::from_columns(vec![
            (
                "koi_disposition",
                Column::Categorical(
                    ["CANDIDATE", "FALSE POSITIVE", "CANDIDATE"]
                        .iter()
                        .map(|s| Some(s.to_string()))
                        .collect(),
                ),
            ),
            ("koi_fpflag_nt", Column::Numeric(vec![0.0, 1.0, 0.0])),
            ("koi_fpflag_ss", Column::Numeric(vec![0.0, 0.0, 0.0])),
            ("koi_fpflag_co", Column::Numeric(vec![0.0, 0.0, 0.0])),
            ("koi_fpflag_ec", Column::Numeric(vec![0.0, 0.0, 0.0])),
            ("koi_model_snr", Column::Numeric(vec![12.0, 40.0, 25.0])),
        ])
        .unwrap();
        write_csv(&input, &table, &["# source".to_string()]).unwrap();

        let output = dir.path().join("selected.csv");
        let config = SelectionConfig {
            per_class: 1,
            seed: 42,
        };
        let selection = select_file(&input, &output, &config).unwrap();
        assert_eq!(selection.table.n_rows(), 2);

        let loaded = load_csv(&output).unwrap();
        assert_eq!(loaded.comments[0], "# source");
        assert!(loaded.comments[1].starts_with("# This file contains 1 candidates"));
        assert_eq!(loaded.comments[2], "#");
    }
}
