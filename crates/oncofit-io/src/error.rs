//! I/O error types for oncofit-io.

use std::path::PathBuf;

/// Errors from file I/O, CSV parsing, dataset preparation, and result
/// serialization.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the CSV file contains a header but zero data rows.
    #[error("empty dataset (no data rows) in {path}")]
    EmptyDataset {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of columns than the header.
    #[error("inconsistent row length in {path}: row {row_index} (gene {gene_id}) has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Gene ID of the offending row.
        gene_id: String,
        /// Expected number of columns (from header).
        expected: usize,
        /// Actual number of columns in this row.
        got: usize,
    },

    /// Returned when a feature cell is not a finite float.
    #[error("non-numeric value in {path}: row {row_index}, column \"{column}\", raw value \"{raw}\"")]
    NonNumericValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Name of the offending column.
        column: String,
        /// The raw string value that failed to parse.
        raw: String,
    },

    /// Returned when a required column is absent from the header.
    #[error("missing column \"{column}\" in {path}")]
    MissingColumn {
        /// Path to the CSV file.
        path: PathBuf,
        /// The column that was expected.
        column: String,
    },

    /// Returned when a target cell is not in the target's label alphabet.
    #[error("unknown label \"{raw}\" in {path} at row {row_index}: expected one of {expected:?}")]
    UnknownLabel {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// The raw label string.
        raw: String,
        /// The label alphabet for the configured target.
        expected: [&'static str; 3],
    },

    /// Returned when the run name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid run name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidRunName {
        /// The invalid name.
        name: String,
    },

    /// Returned when the holdout fraction is outside (0.0, 1.0).
    #[error("invalid test fraction {fraction}: must be in (0.0, 1.0)")]
    InvalidTestFraction {
        /// The offending fraction.
        fraction: f64,
    },

    /// Returned when a dataset has too few rows to split.
    #[error("too few rows to split: {n_rows}")]
    TooFewRows {
        /// Number of rows available.
        n_rows: usize,
    },

    /// Returned when parallel dataset vectors disagree in length.
    #[error("shape mismatch building dataset: {detail}")]
    ShapeMismatch {
        /// What disagreed.
        detail: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
