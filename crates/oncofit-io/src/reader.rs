//! CSV dataset reader with full input validation.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{CellLine, Dataset, GeneId, Label, Target};

/// Derive the cancer context from a data file name.
///
/// The context is the file stem up to the first `.`, so
/// `breast.csv` and `breast.oversampled.csv` both map to `breast`.
/// Falls back to `"unknown"` when the path has no file name.
#[must_use]
pub fn cancer_context(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Reads a labelled gene/cell-line feature table from a CSV file.
///
/// Expected CSV format:
/// - Header row required; first column is the gene ID, second the cell line
/// - Remaining columns are numeric features, except the target column and
///   any explicitly excluded columns (typically the other target columns)
/// - `gene,cell_line,feat_a,feat_b,...,TCGA_annot,CNV`
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::MissingColumn`] | Target column absent from header |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::NonNumericValue`] | Feature cell is not a finite float |
/// | [`IoError::UnknownLabel`] | Target cell outside the target's alphabet |
pub struct DatasetReader {
    path: PathBuf,
    target: Target,
    excluded: Vec<String>,
}

impl DatasetReader {
    /// Create a new reader for the given CSV file and prediction target.
    pub fn new(path: &Path, target: Target) -> Self {
        Self {
            path: path.to_path_buf(),
            target,
            excluded: Vec::new(),
        }
    }

    /// Columns to drop entirely (neither feature nor label). Unlisted
    /// target columns would otherwise be parsed as numeric features.
    #[must_use]
    pub fn with_excluded_columns(mut self, columns: Vec<String>) -> Self {
        self.excluded = columns;
        self
    }

    /// Read and validate the CSV file, returning a [`Dataset`].
    #[instrument(skip(self), fields(path = %self.path.display(), target = %self.target))]
    pub fn read(&self) -> Result<Dataset, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets our own InconsistentRowLength check fire
        // instead of a low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        })?;
        let header: Vec<String> = header.iter().map(str::to_string).collect();
        let expected_cols = header.len();

        let target_col = header
            .iter()
            .position(|name| name == self.target.column())
            .ok_or_else(|| IoError::MissingColumn {
                path: self.path.clone(),
                column: self.target.column().to_string(),
            })?;

        // Columns 0 and 1 are identifiers; the target and excluded
        // columns are dropped; everything else is a feature.
        let feature_cols: Vec<usize> = (2..expected_cols)
            .filter(|&c| c != target_col && !self.excluded.contains(&header[c]))
            .collect();
        let feature_names: Vec<String> =
            feature_cols.iter().map(|&c| header[c].clone()).collect();
        debug!(
            expected_cols,
            n_features = feature_cols.len(),
            "read CSV header"
        );

        let mut gene_ids = Vec::new();
        let mut cell_lines = Vec::new();
        let mut features = Vec::new();
        let mut labels = Vec::new();

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| IoError::CsvParse {
                path: self.path.clone(),
                offset: e.position().map_or(0, |p| p.byte()),
                source: e,
            })?;

            if record.len() != expected_cols {
                let gene_id = record.get(0).unwrap_or("").to_string();
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    gene_id,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            let gene_id = record.get(0).unwrap_or("").to_string();
            let cell_line = record.get(1).unwrap_or("").to_string();

            let mut row = Vec::with_capacity(feature_cols.len());
            for &col in &feature_cols {
                let raw = record.get(col).unwrap_or("");
                let value: f64 = raw.parse().map_err(|_| IoError::NonNumericValue {
                    path: self.path.clone(),
                    row_index,
                    column: header[col].clone(),
                    raw: raw.to_string(),
                })?;
                if !value.is_finite() {
                    return Err(IoError::NonNumericValue {
                        path: self.path.clone(),
                        row_index,
                        column: header[col].clone(),
                        raw: raw.to_string(),
                    });
                }
                row.push(value);
            }

            let raw_label = record.get(target_col).unwrap_or("");
            let label: Label =
                self.target
                    .parse_label(raw_label)
                    .ok_or_else(|| IoError::UnknownLabel {
                        path: self.path.clone(),
                        row_index,
                        raw: raw_label.to_string(),
                        expected: self.target.alphabet(),
                    })?;

            gene_ids.push(GeneId::new(gene_id));
            cell_lines.push(CellLine::new(cell_line));
            features.push(row);
            labels.push(label);
        }

        if gene_ids.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(
            n_samples = gene_ids.len(),
            n_features = feature_names.len(),
            "dataset loaded"
        );

        Dataset::new(gene_ids, cell_lines, feature_names, features, labels)
    }
}
