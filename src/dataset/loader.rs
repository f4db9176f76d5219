//! CSV loading and writing for KOI feature tables.
//!
//! Exports from the NASA Exoplanet Archive start with a preamble of `#`
//! comment lines describing every column. The loader keeps that preamble so
//! derived files (splits, standardized labels, selections) can carry it
//! forward unchanged.
//!
//! Column types are inferred: a column is numeric when every non-empty cell
//! parses as `f64`, otherwise it is categorical.

use crate::dataset::error::DatasetError;
use crate::dataset::table::{Column, FeatureTable};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// A table together with the comment preamble it was read with.
#[derive(Clone, Debug, Default)]
pub struct LoadedTable {
    /// Parsed table.
    pub table: FeatureTable,
    /// Leading comment lines, verbatim (including the `#`).
    pub comments: Vec<String>,
}

/// Load a CSV file, skipping `#` comment lines.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<LoadedTable, DatasetError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let loaded = read_csv(file)?;
    debug!(
        path = %path.display(),
        rows = loaded.table.n_rows(),
        cols = loaded.table.n_cols(),
        comments = loaded.comments.len(),
        "loaded csv"
    );
    Ok(loaded)
}

/// Parse CSV text from any reader, skipping `#` comment lines.
pub fn read_csv<R: Read>(mut reader: R) -> Result<LoadedTable, DatasetError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let mut comments = Vec::new();
    let mut body_start = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            comments.push(line.trim_end_matches(['\r', '\n']).to_string());
            body_start += line.len();
        } else {
            break;
        }
    }

    let mut rdr = ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(text[body_start..].as_bytes());

    let headers = rdr.headers()?.clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(DatasetError::Empty("CSV input has no header row".to_string()));
    }

    let records: Vec<StringRecord> = rdr.records().collect::<Result<_, _>>()?;

    let mut table = FeatureTable::new();
    for (col_idx, name) in headers.iter().enumerate() {
        let cells: Vec<&str> = records
            .iter()
            .map(|record| record.get(col_idx).unwrap_or(""))
            .collect();
        table.push_column(name, infer_column(&cells))?;
    }

    Ok(LoadedTable { table, comments })
}

fn infer_column(cells: &[&str]) -> Column {
    let numeric = cells
        .iter()
        .all(|cell| cell.is_empty() || cell.parse::<f64>().is_ok());
    if numeric {
        Column::Numeric(
            cells
                .iter()
                .map(|cell| cell.parse::<f64>().unwrap_or(f64::NAN))
                .collect(),
        )
    } else {
        Column::Categorical(
            cells
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect(),
        )
    }
}

/// Write a table as CSV, preceded by the given comment lines.
///
/// Existing files are overwritten. Missing cells are written as empty fields.
pub fn write_csv<P: AsRef<Path>>(
    path: P,
    table: &FeatureTable,
    comments: &[String],
) -> Result<(), DatasetError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = BufWriter::new(File::create(path)?);
    write_csv_to(file, table, comments)?;
    debug!(path = %path.display(), rows = table.n_rows(), "wrote csv");
    Ok(())
}

/// Write a table as CSV into any writer.
pub fn write_csv_to<W: Write>(
    mut writer: W,
    table: &FeatureTable,
    comments: &[String],
) -> Result<(), DatasetError> {
    for line in comments {
        writeln!(writer, "{}", line)?;
    }

    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(table.column_names())?;

    let columns: Vec<&Column> = table.iter().map(|(_, column)| column).collect();
    for row in 0..table.n_rows() {
        let record: Vec<String> = columns
            .iter()
            .map(|column| column.cell_string(row).unwrap_or_default())
            .collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}
