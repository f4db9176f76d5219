//! Column-oriented feature table.
//!
//! A [`FeatureTable`] holds named columns of equal length. Numeric columns use
//! `NaN` for missing cells; categorical columns use `None`. The table is the
//! common currency between the CSV loader, the label/selection utilities and
//! the [`Preprocessor`](crate::preprocessing::Preprocessor), which turns it
//! into a dense design matrix.
//!
//! # Example
//!
//! ```rust
//! use koi_classifier::dataset::{Column, FeatureTable};
//!
//! let mut table = FeatureTable::new();
//! table.push_column("koi_period", Column::Numeric(vec![9.49, 54.4, f64::NAN])).unwrap();
//! table
//!     .push_column(
//!         "koi_disposition",
//!         Column::Categorical(vec![
//!             Some("CONFIRMED".to_string()),
//!             Some("FALSE POSITIVE".to_string()),
//!             None,
//!         ]),
//!     )
//!     .unwrap();
//!
//! assert_eq!(table.n_rows(), 3);
//! assert_eq!(table.column("koi_period").unwrap().missing_count(), 1);
//! ```

use crate::dataset::error::DatasetError;
use std::cmp::Ordering;
use std::collections::HashMap;

/// A single table column.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    /// Floating point values; `NaN` marks a missing cell.
    Numeric(Vec<f64>),
    /// String values; `None` marks a missing cell.
    Categorical(Vec<Option<String>>),
}

impl Column {
    /// Number of cells in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Categorical(values) => values.len(),
        }
    }

    /// Whether the column has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human readable kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Column::Numeric(_) => "numeric",
            Column::Categorical(_) => "categorical",
        }
    }

    /// Whether the cell at `row` is missing.
    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            Column::Numeric(values) => values[row].is_nan(),
            Column::Categorical(values) => values[row].is_none(),
        }
    }

    /// Number of missing cells.
    pub fn missing_count(&self) -> usize {
        match self {
            Column::Numeric(values) => values.iter().filter(|v| v.is_nan()).count(),
            Column::Categorical(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }

    /// Text form of a cell, `None` when missing.
    pub fn cell_string(&self, row: usize) -> Option<String> {
        match self {
            Column::Numeric(values) => {
                let v = values[row];
                if v.is_nan() {
                    None
                } else {
                    Some(v.to_string())
                }
            }
            Column::Categorical(values) => values[row].clone(),
        }
    }

    fn take(&self, indices: &[usize]) -> Column {
        match self {
            Column::Numeric(values) => Column::Numeric(indices.iter().map(|&i| values[i]).collect()),
            Column::Categorical(values) => {
                Column::Categorical(indices.iter().map(|&i| values[i].clone()).collect())
            }
        }
    }

    fn append(&mut self, other: &Column) -> bool {
        match (self, other) {
            (Column::Numeric(a), Column::Numeric(b)) => {
                a.extend_from_slice(b);
                true
            }
            (Column::Categorical(a), Column::Categorical(b)) => {
                a.extend(b.iter().cloned());
                true
            }
            _ => false,
        }
    }
}

/// Ordered collection of equally long named columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureTable {
    names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl FeatureTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(name, column)` pairs.
    pub fn from_columns<S: Into<String>>(
        columns: Vec<(S, Column)>,
    ) -> Result<Self, DatasetError> {
        let mut table = Self::new();
        for (name, column) in columns {
            table.push_column(name, column)?;
        }
        Ok(table)
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Column names in table order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Whether a column with this name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterate over `(name, column)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Append a column. The first column fixes the row count.
    pub fn push_column<S: Into<String>>(
        &mut self,
        name: S,
        column: Column,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(DatasetError::SchemaMismatch(format!(
                "duplicate column '{}'",
                name
            )));
        }
        if !self.columns.is_empty() && column.len() != self.n_rows {
            return Err(DatasetError::LengthMismatch {
                column: name,
                expected: self.n_rows,
                got: column.len(),
            });
        }
        if self.columns.is_empty() {
            self.n_rows = column.len();
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Replace the contents of an existing column.
    pub fn replace_column(&mut self, name: &str, column: Column) -> Result<(), DatasetError> {
        let idx = self
            .position(name)
            .ok_or_else(|| DatasetError::UnknownColumn(name.to_string()))?;
        if column.len() != self.n_rows {
            return Err(DatasetError::LengthMismatch {
                column: name.to_string(),
                expected: self.n_rows,
                got: column.len(),
            });
        }
        self.columns[idx] = column;
        Ok(())
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Result<&Column, DatasetError> {
        self.position(name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| DatasetError::UnknownColumn(name.to_string()))
    }

    /// Borrow a numeric column's values.
    pub fn numeric(&self, name: &str) -> Result<&[f64], DatasetError> {
        match self.column(name)? {
            Column::Numeric(values) => Ok(values),
            Column::Categorical(_) => Err(DatasetError::WrongKind {
                column: name.to_string(),
                expected: "numeric",
            }),
        }
    }

    /// Borrow a categorical column's values.
    pub fn categorical(&self, name: &str) -> Result<&[Option<String>], DatasetError> {
        match self.column(name)? {
            Column::Categorical(values) => Ok(values),
            Column::Numeric(_) => Err(DatasetError::WrongKind {
                column: name.to_string(),
                expected: "categorical",
            }),
        }
    }

    /// Column values rendered as text, regardless of kind.
    ///
    /// Used wherever a column is treated as labels (targets, stratification).
    pub fn labels(&self, name: &str) -> Result<Vec<Option<String>>, DatasetError> {
        let column = self.column(name)?;
        Ok((0..self.n_rows).map(|row| column.cell_string(row)).collect())
    }

    /// Remove the named columns; names that are not present are ignored.
    ///
    /// Returns the names that were actually removed.
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<String> {
        let mut removed = Vec::new();
        for name in names {
            if let Some(idx) = self.position(name.as_ref()) {
                removed.push(self.names.remove(idx));
                self.columns.remove(idx);
            }
        }
        if self.columns.is_empty() {
            self.n_rows = 0;
        }
        removed
    }

    /// New table with the given rows, in the given order. Indices may repeat.
    pub fn select_rows(&self, indices: &[usize]) -> Result<FeatureTable, DatasetError> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_rows) {
            return Err(DatasetError::RowOutOfRange {
                index: bad,
                n_rows: self.n_rows,
            });
        }
        Ok(FeatureTable {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            n_rows: if self.columns.is_empty() { 0 } else { indices.len() },
        })
    }

    /// New table with the rows where `mask` is true.
    pub fn filter_rows(&self, mask: &[bool]) -> Result<FeatureTable, DatasetError> {
        if mask.len() != self.n_rows {
            return Err(DatasetError::LengthMismatch {
                column: "<row mask>".to_string(),
                expected: self.n_rows,
                got: mask.len(),
            });
        }
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        self.select_rows(&indices)
    }

    /// Stack the rows of `other` below this table. Both must share the same schema.
    pub fn concat(&self, other: &FeatureTable) -> Result<FeatureTable, DatasetError> {
        if self.names != other.names {
            return Err(DatasetError::SchemaMismatch(
                "tables have different column names".to_string(),
            ));
        }
        let mut result = self.clone();
        for (idx, column) in result.columns.iter_mut().enumerate() {
            if !column.append(&other.columns[idx]) {
                return Err(DatasetError::SchemaMismatch(format!(
                    "column '{}' is {} in one table and {} in the other",
                    self.names[idx],
                    self.columns[idx].kind(),
                    other.columns[idx].kind()
                )));
            }
        }
        result.n_rows = self.n_rows + other.n_rows;
        Ok(result)
    }

    /// Count occurrences of each non-missing value in a column.
    ///
    /// Sorted by count descending, ties broken by value.
    pub fn value_counts(&self, name: &str) -> Result<Vec<(String, usize)>, DatasetError> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for value in self.labels(name)?.into_iter().flatten() {
            *counts.entry(value).or_insert(0) += 1;
        }
        let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }

    /// Rows sorted by a numeric column, largest first. Missing values go last.
    ///
    /// The sort is stable, so equal values keep their input order.
    pub fn sort_by_desc(&self, name: &str) -> Result<FeatureTable, DatasetError> {
        let values = self.numeric(name)?;
        let mut order: Vec<usize> = (0..self.n_rows).collect();
        order.sort_by(|&a, &b| {
            let (va, vb) = (values[a], values[b]);
            match (va.is_nan(), vb.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => vb.partial_cmp(&va).unwrap_or(Ordering::Equal),
            }
        });
        self.select_rows(&order)
    }

    /// First `n` rows (or all of them if the table is shorter).
    pub fn head(&self, n: usize) -> FeatureTable {
        let indices: Vec<usize> = (0..n.min(self.n_rows)).collect();
        FeatureTable {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(&indices)).collect(),
            n_rows: indices.len(),
        }
    }
}
