//! Tabular data handling for KOI feature files.
//!
//! # Core Concepts
//!
//! - **FeatureTable**: named, typed columns as read from a CSV export. Cells
//!   may be missing (`NaN` / `None`).
//! - **LoadedTable**: a table plus the `#` comment preamble of the file it
//!   came from, so derived files can keep the archive's column documentation.
//! - **InMemoryDataset**: the dense `(X, y)` form consumed by classifiers.
//! - **Splits**: seeded train/test partitions and k-fold generators that
//!   operate on row indices.
//!
//! # Example
//!
//! ```no_run
//! use koi_classifier::dataset::{load_csv, split_table, write_csv};
//!
//! let loaded = load_csv("KOI Selected Data.csv").unwrap();
//! let (train, test) = split_table(&loaded.table, 0.2, 42, None).unwrap();
//! write_csv("KOI-Playground-Train-Data.csv", &train, &loaded.comments).unwrap();
//! write_csv("KOI-Playground-Test-Data.csv", &test, &loaded.comments).unwrap();
//! ```

pub mod error;
pub mod loader;
pub mod memory;
pub mod split;
pub mod table;

pub use error::DatasetError;
pub use loader::{load_csv, read_csv, write_csv, write_csv_to, LoadedTable};
pub use memory::InMemoryDataset;
pub use split::{
    split_table, train_test_split, KFold, SplitIndices, StratifiedKFold, DEFAULT_SEED,
    DEFAULT_TEST_SIZE,
};
pub use table::{Column, FeatureTable};
