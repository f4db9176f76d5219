//! Column summaries for a first look at a feature table.

use crate::dataset::{Column, DatasetError, FeatureTable};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;

/// Summary of one column.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSummary {
    Numeric {
        name: String,
        count: usize,
        missing: usize,
        mean: f64,
        /// Sample standard deviation (ddof 1).
        std: f64,
        min: f64,
        /// 25th, 50th and 75th percentiles, linearly interpolated.
        q25: f64,
        median: f64,
        q75: f64,
        max: f64,
    },
    Categorical {
        name: String,
        count: usize,
        missing: usize,
        unique: usize,
        /// Most frequent value (first seen wins ties) and its count.
        top: Option<String>,
        freq: usize,
    },
}

impl ColumnSummary {
    pub fn name(&self) -> &str {
        match self {
            ColumnSummary::Numeric { name, .. } | ColumnSummary::Categorical { name, .. } => name,
        }
    }
}

/// Summarize every column. Statistics of empty numeric columns are NaN.
pub fn describe(table: &FeatureTable) -> Vec<ColumnSummary> {
    table
        .iter()
        .map(|(name, column)| match column {
            Column::Numeric(values) => {
                let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
                let count = present.len();
                let mean = if count > 0 {
                    present.iter().sum::<f64>() / count as f64
                } else {
                    f64::NAN
                };
                let std = if count > 1 {
                    let ss: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
                    (ss / (count - 1) as f64).sqrt()
                } else {
                    f64::NAN
                };
                let mut sorted = present;
                sorted.sort_by(f64::total_cmp);
                ColumnSummary::Numeric {
                    name: name.to_string(),
                    count,
                    missing: values.len() - count,
                    mean,
                    std,
                    min: quantile(&sorted, 0.0),
                    q25: quantile(&sorted, 0.25),
                    median: quantile(&sorted, 0.5),
                    q75: quantile(&sorted, 0.75),
                    max: quantile(&sorted, 1.0),
                }
            }
            Column::Categorical(values) => {
                let present: Vec<&str> = values.iter().flatten().map(String::as_str).collect();
                let mut counts: HashMap<&str, usize> = HashMap::new();
                let mut first_seen = Vec::new();
                for &value in &present {
                    let n = counts.entry(value).or_insert(0);
                    if *n == 0 {
                        first_seen.push(value);
                    }
                    *n += 1;
                }
                let mut top: Option<(&str, usize)> = None;
                for value in first_seen {
                    let n = counts[value];
                    if top.map_or(true, |(_, best)| n > best) {
                        top = Some((value, n));
                    }
                }
                ColumnSummary::Categorical {
                    name: name.to_string(),
                    count: present.len(),
                    missing: values.len() - present.len(),
                    unique: counts.len(),
                    top: top.map(|(value, _)| value.to_string()),
                    freq: top.map_or(0, |(_, n)| n),
                }
            }
        })
        .collect()
}

/// Quantile of sorted values with linear interpolation; NaN when empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        n => {
            let pos = q * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

/// Class counts and fractions of a label column, most frequent first.
pub fn class_distribution(
    table: &FeatureTable,
    column: &str,
) -> Result<Vec<(String, usize, f64)>, DatasetError> {
    let counts = table.value_counts(column)?;
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    Ok(counts
        .into_iter()
        .map(|(label, n)| {
            let fraction = if total > 0 { n as f64 / total as f64 } else { 0.0 };
            (label, n, fraction)
        })
        .collect())
}

/// Fixed-width text report of [`describe`] plus an optional class distribution.
pub fn render_report(
    table: &FeatureTable,
    label_column: Option<&str>,
) -> Result<String, DatasetError> {
    let summaries = describe(table);
    let width = summaries
        .iter()
        .map(|s| s.name().len())
        .max()
        .unwrap_or(6)
        .max(6);

    let mut out = String::new();
    let _ = writeln!(out, "{} rows x {} columns", table.n_rows(), table.n_cols());
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<width$} {:>8} {:>8} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "column", "count", "missing", "mean", "std", "min", "25%", "50%", "75%", "max"
    );
    for summary in &summaries {
        match summary {
            ColumnSummary::Numeric {
                name,
                count,
                missing,
                mean,
                std,
                min,
                q25,
                median,
                q75,
                max,
            } => {
                let _ = writeln!(
                    out,
                    "{:<width$} {:>8} {:>8} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
                    name, count, missing, mean, std, min, q25, median, q75, max
                );
            }
            ColumnSummary::Categorical {
                name,
                count,
                missing,
                unique,
                top,
                freq,
            } => {
                let _ = writeln!(
                    out,
                    "{:<width$} {:>8} {:>8} {:>12}  top: {} ({})",
                    name,
                    count,
                    missing,
                    format!("{} unique", unique),
                    top.as_deref().unwrap_or("-"),
                    freq
                );
            }
        }
    }

    if let Some(column) = label_column {
        let _ = writeln!(out);
        let _ = writeln!(out, "class distribution ({}):", column);
        for (label, n, fraction) in class_distribution(table, column)? {
            let _ = writeln!(out, "  {:<24} {:>8} {:>7.2}%", label, n, fraction * 100.0);
        }
    }
    Ok(out)
}
