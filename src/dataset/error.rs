//! Error types for table and CSV operations.

/// Error type for feature-table, CSV and split operations.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// A column name was not found in the table.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
    /// A column has a different number of rows than the table.
    #[error("Length mismatch for column '{column}': expected {expected} rows, got {got}")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },
    /// Two tables (or a table and a new column) have incompatible schemas.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
    /// A column has the wrong kind for the requested operation.
    #[error("Column '{column}' is not {expected}")]
    WrongKind {
        column: String,
        expected: &'static str,
    },
    /// A row index is outside the table.
    #[error("Row index {index} out of bounds for table with {n_rows} rows")]
    RowOutOfRange { index: usize, n_rows: usize },
    /// Label values that have no entry in a disposition mapping.
    #[error("Column '{column}' has values that could not be mapped: {values:?}")]
    UnmappedValues { column: String, values: Vec<String> },
    /// Invalid split or fold parameters.
    #[error("Invalid split: {0}")]
    InvalidSplit(String),
    /// Empty input where rows or a header were required.
    #[error("Empty data: {0}")]
    Empty(String),
    /// Malformed CSV input.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// I/O error while reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_length_mismatch() {
        let err = DatasetError::LengthMismatch {
            column: "koi_prad".to_string(),
            expected: 3,
            got: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("koi_prad"));
        assert!(msg.contains("expected 3"));
    }

    #[test]
    fn test_error_display_unmapped() {
        let err = DatasetError::UnmappedValues {
            column: "tfopwg_disp".to_string(),
            values: vec!["XX".to_string()],
        };
        assert!(err.to_string().contains("XX"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        let err: DatasetError = io_err.into();
        assert!(matches!(err, DatasetError::Io(_)));
    }
}
