//! Domain types for oncofit-io.

use std::collections::BTreeMap;

use crate::IoError;

/// The three-way regulation outcome a model predicts.
///
/// Class indices are fixed: `Up` = 0, `Neutral` = 1, `Down` = 2. Metric
/// lookups for the extreme classes go through label identity, never
/// through a position in some intermediate collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// Upregulated (or copy-number gain).
    Up,
    /// No significant change.
    Neutral,
    /// Downregulated (or copy-number loss).
    Down,
}

impl Label {
    /// All labels in class-index order.
    pub const ALL: [Label; 3] = [Label::Up, Label::Neutral, Label::Down];

    /// The zero-based class index used throughout training and metrics.
    #[must_use]
    pub fn class_index(&self) -> usize {
        match self {
            Label::Up => 0,
            Label::Neutral => 1,
            Label::Down => 2,
        }
    }

    /// Inverse of [`Label::class_index`]. Returns `None` for indices >= 3.
    #[must_use]
    pub fn from_class_index(index: usize) -> Option<Label> {
        match index {
            0 => Some(Label::Up),
            1 => Some(Label::Neutral),
            2 => Some(Label::Down),
            _ => None,
        }
    }

    /// Ordinal encoding for gradient correlation: +1, 0, -1.
    #[must_use]
    pub fn ordinal(&self) -> f64 {
        match self {
            Label::Up => 1.0,
            Label::Neutral => 0.0,
            Label::Down => -1.0,
        }
    }
}

/// The prediction target, identified by its CSV column name.
///
/// The label alphabet depends on the target: copy-number variation uses
/// `GAIN`/`NEUT`/`LOSS`, every other target uses `UPREG`/`NEUTRAL`/`DOWNREG`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    column: String,
}

impl Target {
    /// Create a target for the given CSV column.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }

    /// The CSV column holding the target labels.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    fn is_copy_number(&self) -> bool {
        self.column == "CNV"
    }

    /// The three label strings for this target, in class-index order.
    #[must_use]
    pub fn alphabet(&self) -> [&'static str; 3] {
        if self.is_copy_number() {
            ["GAIN", "NEUT", "LOSS"]
        } else {
            ["UPREG", "NEUTRAL", "DOWNREG"]
        }
    }

    /// Parse a raw label cell into a [`Label`].
    #[must_use]
    pub fn parse_label(&self, raw: &str) -> Option<Label> {
        let [up, neutral, down] = self.alphabet();
        if raw == up {
            Some(Label::Up)
        } else if raw == neutral {
            Some(Label::Neutral)
        } else if raw == down {
            Some(Label::Down)
        } else {
            None
        }
    }

    /// The display name for a label under this target's alphabet.
    #[must_use]
    pub fn label_name(&self, label: Label) -> &'static str {
        self.alphabet()[label.class_index()]
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.column)
    }
}

/// A gene identifier from the first CSV column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeneId(String);

impl GeneId {
    pub fn new(id: String) -> Self {
        debug_assert!(!id.is_empty(), "gene ID must not be empty");
        Self(id)
    }

    /// Return the gene ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GeneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cell line identifier from the second CSV column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellLine(String);

impl CellLine {
    /// Create a cell line identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the cell line as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CellLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated run name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunName(String);

impl RunName {
    /// Parse and validate a run name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidRunName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidRunName { name });
        }
        Ok(Self(name))
    }

    /// Return the run name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A labelled gene/cell-line feature table.
///
/// Produced by [`DatasetReader`](crate::DatasetReader). Gene IDs, cell
/// lines, feature rows, and labels are stored in parallel vectors —
/// `gene_ids[i]`, `cell_lines[i]`, `features[i]`, and `labels[i]` all
/// describe the same sample.
#[derive(Debug, Clone)]
pub struct Dataset {
    gene_ids: Vec<GeneId>,
    cell_lines: Vec<CellLine>,
    feature_names: Vec<String>,
    /// Feature values: `features[sample_index][feature_index]`.
    features: Vec<Vec<f64>>,
    labels: Vec<Label>,
}

/// A train/test partition of a [`Dataset`].
#[derive(Debug)]
pub struct Split {
    /// The training partition.
    pub train: Dataset,
    /// The held-out partition.
    pub test: Dataset,
}

impl Dataset {
    /// Assemble a dataset from parallel vectors.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::ShapeMismatch`] when the vectors disagree in
    /// length or a feature row does not match `feature_names`.
    pub fn new(
        gene_ids: Vec<GeneId>,
        cell_lines: Vec<CellLine>,
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
        labels: Vec<Label>,
    ) -> Result<Self, IoError> {
        let n = gene_ids.len();
        if cell_lines.len() != n || features.len() != n || labels.len() != n {
            return Err(IoError::ShapeMismatch {
                detail: format!(
                    "{} gene IDs, {} cell lines, {} feature rows, {} labels",
                    n,
                    cell_lines.len(),
                    features.len(),
                    labels.len()
                ),
            });
        }
        if let Some((i, row)) = features
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != feature_names.len())
        {
            return Err(IoError::ShapeMismatch {
                detail: format!(
                    "row {} has {} features, header names {}",
                    i,
                    row.len(),
                    feature_names.len()
                ),
            });
        }
        Ok(Self {
            gene_ids,
            cell_lines,
            feature_names,
            features,
            labels,
        })
    }

    /// Return the gene IDs.
    #[must_use]
    pub fn gene_ids(&self) -> &[GeneId] {
        &self.gene_ids
    }

    /// Return the cell lines.
    #[must_use]
    pub fn cell_lines(&self) -> &[CellLine] {
        &self.cell_lines
    }

    /// Return the feature column names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the feature matrix (row-major).
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Mutable access to the feature matrix, for in-place scaling.
    pub(crate) fn features_mut(&mut self) -> &mut Vec<Vec<f64>> {
        &mut self.features
    }

    /// Return the labels.
    #[must_use]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Return the labels as zero-based class indices.
    #[must_use]
    pub fn labels_as_indices(&self) -> Vec<usize> {
        self.labels.iter().map(Label::class_index).collect()
    }

    /// Return the number of samples.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.gene_ids.len()
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Distinct cell lines in sorted order.
    #[must_use]
    pub fn distinct_cell_lines(&self) -> Vec<CellLine> {
        let mut lines: Vec<CellLine> = self.cell_lines.clone();
        lines.sort();
        lines.dedup();
        lines
    }

    /// Count of samples per label, over labels that occur.
    #[must_use]
    pub fn class_counts(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.class_index()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of distinct labels present.
    #[must_use]
    pub fn n_classes_present(&self) -> usize {
        self.class_counts().len()
    }

    /// A new dataset keeping only the feature columns at `column_indices`,
    /// in the given order.
    #[must_use]
    pub fn restrict_columns(&self, column_indices: &[usize]) -> Dataset {
        let feature_names = column_indices
            .iter()
            .map(|&c| self.feature_names[c].clone())
            .collect();
        let features = self
            .features
            .iter()
            .map(|row| column_indices.iter().map(|&c| row[c]).collect())
            .collect();
        Dataset {
            gene_ids: self.gene_ids.clone(),
            cell_lines: self.cell_lines.clone(),
            feature_names,
            features,
            labels: self.labels.clone(),
        }
    }

    /// A new dataset keeping only the samples at `row_indices`,
    /// in the given order.
    #[must_use]
    pub fn subset(&self, row_indices: &[usize]) -> Dataset {
        Dataset {
            gene_ids: row_indices
                .iter()
                .map(|&i| self.gene_ids[i].clone())
                .collect(),
            cell_lines: row_indices
                .iter()
                .map(|&i| self.cell_lines[i].clone())
                .collect(),
            feature_names: self.feature_names.clone(),
            features: row_indices
                .iter()
                .map(|&i| self.features[i].clone())
                .collect(),
            labels: row_indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// A new dataset keeping only the samples whose row passes `keep`.
    #[must_use]
    pub fn filter_rows(&self, mut keep: impl FnMut(usize) -> bool) -> Dataset {
        let indices: Vec<usize> = (0..self.n_samples()).filter(|&i| keep(i)).collect();
        self.subset(&indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_dataset() -> Dataset {
        Dataset::new(
            vec![
                GeneId::new("TP53".to_string()),
                GeneId::new("MYC".to_string()),
                GeneId::new("KRAS".to_string()),
            ],
            vec![
                CellLine::new("HELA"),
                CellLine::new("A549"),
                CellLine::new("HELA"),
            ],
            vec!["f0".to_string(), "f1".to_string(), "f2".to_string()],
            vec![
                vec![1.0, 2.0, 3.0],
                vec![4.0, 5.0, 6.0],
                vec![7.0, 8.0, 9.0],
            ],
            vec![Label::Up, Label::Neutral, Label::Down],
        )
        .unwrap()
    }

    #[test]
    fn label_round_trip() {
        for label in Label::ALL {
            assert_eq!(Label::from_class_index(label.class_index()), Some(label));
        }
        assert_eq!(Label::from_class_index(3), None);
    }

    #[test]
    fn label_ordinals() {
        assert_eq!(Label::Up.ordinal(), 1.0);
        assert_eq!(Label::Neutral.ordinal(), 0.0);
        assert_eq!(Label::Down.ordinal(), -1.0);
    }

    #[test]
    fn cnv_target_alphabet() {
        let target = Target::new("CNV");
        assert_eq!(target.alphabet(), ["GAIN", "NEUT", "LOSS"]);
        assert_eq!(target.parse_label("GAIN"), Some(Label::Up));
        assert_eq!(target.parse_label("LOSS"), Some(Label::Down));
        assert_eq!(target.parse_label("UPREG"), None);
    }

    #[test]
    fn expression_target_alphabet() {
        let target = Target::new("TCGA_annot");
        assert_eq!(target.alphabet(), ["UPREG", "NEUTRAL", "DOWNREG"]);
        assert_eq!(target.parse_label("NEUTRAL"), Some(Label::Neutral));
        assert_eq!(target.label_name(Label::Down), "DOWNREG");
    }

    #[test]
    fn run_name_validation() {
        assert!(RunName::new("run-01_a".to_string()).is_ok());
        assert!(matches!(
            RunName::new(String::new()),
            Err(IoError::InvalidRunName { .. })
        ));
        assert!(matches!(
            RunName::new("bad name!".to_string()),
            Err(IoError::InvalidRunName { .. })
        ));
    }

    #[test]
    fn shape_mismatch_rejected() {
        let err = Dataset::new(
            vec![GeneId::new("TP53".to_string())],
            vec![CellLine::new("HELA")],
            vec!["f0".to_string()],
            vec![vec![1.0, 2.0]],
            vec![Label::Up],
        )
        .unwrap_err();
        assert!(matches!(err, IoError::ShapeMismatch { .. }));
    }

    #[test]
    fn restrict_columns_reorders() {
        let ds = tiny_dataset();
        let restricted = ds.restrict_columns(&[2, 0]);
        assert_eq!(restricted.feature_names(), &["f2", "f0"]);
        assert_eq!(restricted.features()[0], vec![3.0, 1.0]);
        assert_eq!(restricted.n_samples(), 3);
    }

    #[test]
    fn subset_keeps_parallel_vectors_aligned() {
        let ds = tiny_dataset();
        let sub = ds.subset(&[2, 0]);
        assert_eq!(sub.gene_ids()[0].as_str(), "KRAS");
        assert_eq!(sub.labels()[0], Label::Down);
        assert_eq!(sub.features()[1], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn distinct_cell_lines_sorted_deduped() {
        let ds = tiny_dataset();
        let lines = ds.distinct_cell_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].as_str(), "A549");
        assert_eq!(lines[1].as_str(), "HELA");
    }

    #[test]
    fn class_counts_cover_present_labels() {
        let ds = tiny_dataset();
        let counts = ds.class_counts();
        assert_eq!(counts.len(), 3);
        assert_eq!(counts[&0], 1);
    }
}
