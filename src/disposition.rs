//! Disposition label standardization across exoplanet surveys.
//!
//! Kepler, K2 and TESS catalogues use different vocabularies for the vetting
//! outcome of a signal. Training on a mix of them requires a shared binary
//! label, which this module provides:
//!
//! | Mission | Column | `candidate` | `non-candidate` |
//! |---------|--------|-------------|-----------------|
//! | Kepler | `koi_disposition` | CONFIRMED, CANDIDATE | FALSE POSITIVE |
//! | K2 | `disposition` | CONFIRMED, CANDIDATE | FALSE POSITIVE, REFUTED |
//! | TESS | `tfopwg_disp` | PC, CP, KP, APC | FP, FA |
//!
//! Values that are already standardized map to themselves, so running the
//! standardization twice is harmless.

use crate::dataset::{Column, DatasetError, FeatureTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::info;

/// Survey a catalogue comes from.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Mission {
    /// Kepler Objects of Interest.
    Kepler,
    /// K2 planets and candidates.
    K2,
    /// TESS Objects of Interest.
    Tess,
}

/// Binary vetting outcome shared by all missions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    Candidate,
    NonCandidate,
}

impl Disposition {
    /// Label string written into standardized files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Candidate => "candidate",
            Disposition::NonCandidate => "non-candidate",
        }
    }

    fn from_standard(value: &str) -> Option<Self> {
        match value {
            "candidate" => Some(Disposition::Candidate),
            "non-candidate" => Some(Disposition::NonCandidate),
            _ => None,
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Mission {
    /// Name of the column holding the disposition in this mission's exports.
    pub fn disposition_column(&self) -> &'static str {
        match self {
            Mission::Kepler => "koi_disposition",
            Mission::K2 => "disposition",
            Mission::Tess => "tfopwg_disp",
        }
    }

    /// Map a raw catalogue value to the shared binary label.
    pub fn map_disposition(&self, raw: &str) -> Option<Disposition> {
        let raw = raw.trim();
        let mapped = match self {
            Mission::Kepler => match raw {
                "CONFIRMED" | "CANDIDATE" => Some(Disposition::Candidate),
                "FALSE POSITIVE" => Some(Disposition::NonCandidate),
                _ => None,
            },
            Mission::K2 => match raw {
                "CONFIRMED" | "CANDIDATE" => Some(Disposition::Candidate),
                "FALSE POSITIVE" | "REFUTED" => Some(Disposition::NonCandidate),
                _ => None,
            },
            Mission::Tess => match raw {
                "PC" | "CP" | "KP" | "APC" => Some(Disposition::Candidate),
                "FP" | "FA" => Some(Disposition::NonCandidate),
                _ => None,
            },
        };
        mapped.or_else(|| Disposition::from_standard(raw))
    }
}

impl fmt::Display for Mission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mission::Kepler => "Kepler",
            Mission::K2 => "K2",
            Mission::Tess => "TESS",
        };
        f.write_str(name)
    }
}

/// Label distributions before and after standardization.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StandardizeSummary {
    pub column: String,
    pub before: Vec<(String, usize)>,
    pub after: Vec<(String, usize)>,
}

/// Rewrite a table's disposition column into `candidate` / `non-candidate`.
///
/// If any value (including a missing cell) cannot be mapped, the table is left
/// untouched and [`DatasetError::UnmappedValues`] lists the offending values.
pub fn standardize(
    table: &mut FeatureTable,
    mission: Mission,
) -> Result<StandardizeSummary, DatasetError> {
    let column = mission.disposition_column();
    let before = table.value_counts(column)?;
    let raw = table.labels(column)?;

    let mut unmapped = BTreeSet::new();
    let mut mapped = Vec::with_capacity(raw.len());
    for value in &raw {
        match value.as_deref().and_then(|v| mission.map_disposition(v)) {
            Some(label) => mapped.push(Some(label.as_str().to_string())),
            None => {
                unmapped.insert(value.clone().unwrap_or_else(|| "<missing>".to_string()));
            }
        }
    }

    if !unmapped.is_empty() {
        return Err(DatasetError::UnmappedValues {
            column: column.to_string(),
            values: unmapped.into_iter().collect(),
        });
    }

    table.replace_column(column, Column::Categorical(mapped))?;
    let after = table.value_counts(column)?;
    info!(%mission, column, ?before, ?after, "standardized dispositions");

    Ok(StandardizeSummary {
        column: column.to_string(),
        before,
        after,
    })
}
