//! Balanced high-SNR signal selection.
//!
//! Builds a two-class subset of a KOI table: clean candidates (disposition
//! `CANDIDATE` with every false-positive flag at 0) and false positives (any
//! flags), each ranked by `koi_model_snr` and truncated to `per_class` rows.
//! The union is shuffled with a fixed seed.

use crate::dataset::{DatasetError, FeatureTable};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DISPOSITION_COLUMN: &str = "koi_disposition";
pub const SNR_COLUMN: &str = "koi_model_snr";
pub const FP_FLAG_COLUMNS: [&str; 4] = [
    "koi_fpflag_nt",
    "koi_fpflag_ss",
    "koi_fpflag_co",
    "koi_fpflag_ec",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Rows requested from each group.
    pub per_class: usize,
    pub seed: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            per_class: 1000,
            seed: 42,
        }
    }
}

/// Min / max / mean SNR of a selected group. All NaN when the group is empty.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SnrStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl SnrStats {
    fn of(values: &[f64]) -> Self {
        let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if present.is_empty() {
            return Self {
                min: f64::NAN,
                max: f64::NAN,
                mean: f64::NAN,
            };
        }
        Self {
            min: present.iter().copied().fold(f64::INFINITY, f64::min),
            max: present.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean: present.iter().sum::<f64>() / present.len() as f64,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Selection {
    /// Selected rows, shuffled.
    pub table: FeatureTable,
    pub candidates: usize,
    pub false_positives: usize,
    /// Size of each eligible pool before truncation.
    pub available_candidates: usize,
    pub available_false_positives: usize,
    pub candidate_snr: SnrStats,
    pub false_positive_snr: SnrStats,
}

impl Selection {
    /// Comment lines appended to the source preamble in the output CSV.
    pub fn comment_lines(&self) -> Vec<String> {
        vec![
            format!(
                "# This file contains {} candidates with clean signals (all FP flags = 0) and {} false positives, selected based on highest Signal-to-Noise Ratio",
                self.candidates, self.false_positives
            ),
            "#".to_string(),
        ]
    }
}

fn take_top(
    table: &FeatureTable,
    mask: &[bool],
    per_class: usize,
    group: &str,
) -> Result<(FeatureTable, usize), DatasetError> {
    let pool = table.filter_rows(mask)?;
    let available = pool.n_rows();
    if available < per_class {
        warn!(
            group,
            available,
            requested = per_class,
            "fewer rows available than requested"
        );
    }
    Ok((pool.sort_by_desc(SNR_COLUMN)?.head(per_class), available))
}

/// Select the top-SNR clean candidates and false positives.
pub fn select_balanced(
    table: &FeatureTable,
    config: &SelectionConfig,
) -> Result<Selection, DatasetError> {
    let disposition = table.labels(DISPOSITION_COLUMN)?;
    let flags = FP_FLAG_COLUMNS
        .iter()
        .map(|name| table.numeric(name))
        .collect::<Result<Vec<_>, _>>()?;
    // fail early if the ranking column is missing or not numeric
    table.numeric(SNR_COLUMN)?;

    let clean: Vec<bool> = (0..table.n_rows())
        .map(|row| {
            disposition[row].as_deref() == Some("CANDIDATE")
                && flags.iter().all(|column| column[row] == 0.0)
        })
        .collect();
    let false_positive: Vec<bool> = disposition
        .iter()
        .map(|d| d.as_deref() == Some("FALSE POSITIVE"))
        .collect();

    let (candidates, available_candidates) =
        take_top(table, &clean, config.per_class, "candidates")?;
    let (false_positives, available_false_positives) =
        take_top(table, &false_positive, config.per_class, "false positives")?;

    let candidate_snr = SnrStats::of(candidates.numeric(SNR_COLUMN)?);
    let false_positive_snr = SnrStats::of(false_positives.numeric(SNR_COLUMN)?);

    let combined = candidates.concat(&false_positives)?;
    let mut order: Vec<usize> = (0..combined.n_rows()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(config.seed));
    let shuffled = combined.select_rows(&order)?;

    info!(
        total = table.n_rows(),
        available_candidates,
        available_false_positives,
        candidates = candidates.n_rows(),
        false_positives = false_positives.n_rows(),
        "selected balanced signals"
    );

    Ok(Selection {
        table: shuffled,
        candidates: candidates.n_rows(),
        false_positives: false_positives.n_rows(),
        available_candidates,
        available_false_positives,
        candidate_snr,
        false_positive_snr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;

    fn koi_rows() -> FeatureTable {
        // (disposition, flags, snr)
        let rows: Vec<(&str, [f64; 4], f64)> = vec![
            ("CANDIDATE", [0.0; 4], 50.0),
            ("CANDIDATE", [0.0; 4], 10.0),
            ("CANDIDATE", [1.0, 0.0, 0.0, 0.0], 99.0),
            ("CANDIDATE", [0.0; 4], 30.0),
            ("FALSE POSITIVE", [1.0, 1.0, 0.0, 0.0], 80.0),
            ("FALSE POSITIVE", [0.0; 4], 5.0),
            ("FALSE POSITIVE", [0.0, 0.0, 1.0, 0.0], 60.0),
            ("CONFIRMED", [0.0; 4], 200.0),
        ];
        let mut columns = vec![(
            DISPOSITION_COLUMN,
            Column::Categorical(rows.iter().map(|r| Some(r.0.to_string())).collect()),
        )];
        for (k, name) in FP_FLAG_COLUMNS.iter().enumerate() {
            columns.push((*name, Column::Numeric(rows.iter().map(|r| r.1[k]).collect())));
        }
        columns.push((SNR_COLUMN, Column::Numeric(rows.iter().map(|r| r.2).collect())));
        FeatureTable::from_columns(columns).unwrap()
    }

    #[test]
    fn test_selects_top_snr_per_group() {
        let config = SelectionConfig {
            per_class: 2,
            seed: 42,
        };
        let selection = select_balanced(&koi_rows(), &config).unwrap();
        assert_eq!(selection.candidates, 2);
        assert_eq!(selection.false_positives, 2);
        assert_eq!(selection.available_candidates, 3);
        assert_eq!(selection.available_false_positives, 3);

        let mut snr = selection.table.numeric(SNR_COLUMN).unwrap().to_vec();
        snr.sort_by(|a, b| a.total_cmp(b));
        // flagged candidate (99) and CONFIRMED (200) are excluded
        assert_eq!(snr, vec![30.0, 50.0, 60.0, 80.0]);

        assert_eq!(selection.candidate_snr.min, 30.0);
        assert_eq!(selection.candidate_snr.max, 50.0);
        assert_eq!(selection.false_positive_snr.mean, 70.0);
    }

    #[test]
    fn test_short_pool_takes_everything() {
        let config = SelectionConfig {
            per_class: 1000,
            seed: 1,
        };
        let selection = select_balanced(&koi_rows(), &config).unwrap();
        assert_eq!(selection.candidates, 3);
        assert_eq!(selection.false_positives, 3);
        assert_eq!(selection.table.n_rows(), 6);
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let config = SelectionConfig::default();
        let a = select_balanced(&koi_rows(), &config).unwrap();
        let b = select_balanced(&koi_rows(), &config).unwrap();
        assert_eq!(a.table, b.table);
    }

    #[test]
    fn test_comment_lines() {
        let selection = select_balanced(&koi_rows(), &SelectionConfig::default()).unwrap();
        let lines = selection.comment_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("# This file contains 3 candidates"));
        assert!(lines[0].contains("and 3 false positives"));
        assert_eq!(lines[1], "#");
    }

    #[test]
    fn test_missing_flag_column() {
        let mut table = koi_rows();
        table.drop_columns(&["koi_fpflag_ec"]);
        assert!(matches!(
            select_balanced(&table, &SelectionConfig::default()),
            Err(DatasetError::UnknownColumn(_))
        ));
    }
}
