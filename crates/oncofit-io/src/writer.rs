//! CSV result writer for evaluation, ablation, and diagnostic outputs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::RunName;

/// One summary row per evaluated target, accumulated across trials.
///
/// Shadow struct over primitives — the writer has no dependency on the
/// model or evaluation crates.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    /// Cancer context derived from the input file name.
    pub cancer: String,
    /// Target column the model predicted.
    pub target: String,
    /// Mean cross-validation accuracy across trials.
    pub cv_accuracy: f64,
    /// Mean out-of-bag accuracy across trials.
    pub oob_accuracy: f64,
    /// Mean holdout accuracy across trials.
    pub mean_accuracy: f64,
    /// Sample standard deviation of holdout accuracy.
    pub sigma: f64,
    /// Mean Cohen's kappa.
    pub kappa: f64,
    /// Mean micro-averaged F1.
    pub micro_f1: f64,
    /// Mean Matthews correlation coefficient.
    pub mcc: f64,
    /// Mean micro-averaged precision.
    pub precision: f64,
    /// Mean micro-averaged recall.
    pub recall: f64,
    /// Mean precision of the upregulated class.
    pub up_precision: f64,
    /// Mean recall of the upregulated class.
    pub up_recall: f64,
    /// Mean precision of the downregulated class.
    pub down_precision: f64,
    /// Mean recall of the downregulated class.
    pub down_recall: f64,
    /// One-sample t statistic of the accuracy series.
    pub t_score: f64,
    /// Two-tailed p-value, floored at 1e-50.
    pub p_value: f64,
    /// Number of completed trials.
    pub n_trials: usize,
    /// Number of failed trials.
    pub n_failed: usize,
}

/// One ablation measurement: a feature group at a grid point.
#[derive(Debug, Clone, Serialize)]
pub struct AblationRow {
    /// Cancer context.
    pub cancer: String,
    /// Target column.
    pub target: String,
    /// Feature group display name; empty for a full-matrix sweep.
    pub group: Option<String>,
    /// Excluded cell line, when sweeping cell lines.
    pub held_out_cell_line: Option<String>,
    /// Number of features retained at this grid point.
    pub n_features: usize,
    /// Holdout accuracy of the scored fit.
    pub accuracy: f64,
}

/// One skipped ablation group with the reason it was skipped.
#[derive(Debug, Clone, Serialize)]
pub struct AblationSkipRow {
    /// Cancer context.
    pub cancer: String,
    /// Feature group display name; empty for a full-matrix sweep.
    pub group: Option<String>,
    /// Excluded cell line, when sweeping cell lines.
    pub held_out_cell_line: Option<String>,
    /// Why the group was skipped.
    pub reason: String,
}

/// AUROC diagnostic for one evaluated target.
#[derive(Debug, Clone, Serialize)]
pub struct AurocRow {
    /// Cancer context.
    pub cancer: String,
    /// Target column.
    pub target: String,
    /// Micro-averaged one-vs-rest AUROC.
    pub auroc: f64,
    /// AUROC of the upregulated class (NaN when absent from the holdout).
    pub up_auroc: f64,
    /// AUROC of the neutral class.
    pub neutral_auroc: f64,
    /// AUROC of the downregulated class.
    pub down_auroc: f64,
}

/// Per-feature correlation of class medians against the ordinal gradient.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationRow {
    /// Feature column name.
    pub feature: String,
    /// Pearson correlation of per-class medians vs [+1, 0, -1].
    pub correlation: f64,
}

/// Writes evaluation artifacts as CSV files under one output directory.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{run}_{artifact}.csv`.
pub struct ResultWriter {
    output_dir: PathBuf,
    run: RunName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and run name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), run = %run))]
    pub fn new(output_dir: &Path, run: RunName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            run,
        })
    }

    fn artifact_path(&self, artifact: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{artifact}.csv", self.run.as_str()))
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), IoError> {
        fs::write(path, bytes).map_err(|e| IoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn serialize_rows<T: Serialize>(rows: &[T]) -> Vec<u8> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        for row in rows {
            wtr.serialize(row).expect("serialization cannot fail");
        }
        wtr.into_inner().expect("flush to Vec cannot fail")
    }

    /// Write the accumulated confusion matrix to `{run}_confusion.csv`
    /// and its row-normalized form to `{run}_confusion_normalized.csv`.
    ///
    /// Rows are true labels, columns predicted labels, both in
    /// class-index order under `label_names`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if a file cannot be written.
    #[instrument(skip_all)]
    pub fn write_confusion(
        &self,
        label_names: [&str; 3],
        raw: &[Vec<u64>],
        normalized: &[Vec<f64>],
    ) -> Result<(), IoError> {
        let raw_path = self.artifact_path("confusion");
        let mut wtr = csv::Writer::from_writer(Vec::new());
        let mut header = vec!["true_label"];
        header.extend_from_slice(&label_names);
        wtr.write_record(&header).expect("write to Vec cannot fail");
        for (name, row) in label_names.iter().zip(raw) {
            let mut record = vec![name.to_string()];
            record.extend(row.iter().map(u64::to_string));
            wtr.write_record(&record).expect("write to Vec cannot fail");
        }
        let bytes = wtr.into_inner().expect("flush to Vec cannot fail");
        self.write_bytes(&raw_path, &bytes)?;

        let norm_path = self.artifact_path("confusion_normalized");
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(&header).expect("write to Vec cannot fail");
        for (name, row) in label_names.iter().zip(normalized) {
            let mut record = vec![name.to_string()];
            record.extend(row.iter().map(|v| v.to_string()));
            wtr.write_record(&record).expect("write to Vec cannot fail");
        }
        let bytes = wtr.into_inner().expect("flush to Vec cannot fail");
        self.write_bytes(&norm_path, &bytes)?;

        info!(path = %raw_path.display(), "confusion matrices written");
        Ok(())
    }

    /// Write summary rows to `{run}_summary.csv`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_summary(&self, rows: &[SummaryRow]) -> Result<(), IoError> {
        let path = self.artifact_path("summary");
        self.write_bytes(&path, &Self::serialize_rows(rows))?;
        info!(path = %path.display(), n_rows = rows.len(), "summary written");
        Ok(())
    }

    /// Write ablation measurements to `{run}_ablation.csv` and skipped
    /// groups to `{run}_ablation_skips.csv`.
    ///
    /// The skips file is written even when empty, so a run always
    /// produces both artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if a file cannot be written.
    #[instrument(skip_all)]
    pub fn write_ablation(
        &self,
        rows: &[AblationRow],
        skips: &[AblationSkipRow],
    ) -> Result<(), IoError> {
        let path = self.artifact_path("ablation");
        self.write_bytes(&path, &Self::serialize_rows(rows))?;

        let skips_path = self.artifact_path("ablation_skips");
        let bytes = if skips.is_empty() {
            b"cancer,group,held_out_cell_line,reason\n".to_vec()
        } else {
            Self::serialize_rows(skips)
        };
        self.write_bytes(&skips_path, &bytes)?;

        info!(
            path = %path.display(),
            n_rows = rows.len(),
            n_skips = skips.len(),
            "ablation results written"
        );
        Ok(())
    }

    /// Write AUROC diagnostics to `{run}_auroc.csv`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_auroc(&self, rows: &[AurocRow]) -> Result<(), IoError> {
        let path = self.artifact_path("auroc");
        self.write_bytes(&path, &Self::serialize_rows(rows))?;
        info!(path = %path.display(), n_rows = rows.len(), "AUROC written");
        Ok(())
    }

    /// Write gradient correlations to `{run}_correlation.csv`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_correlation(&self, rows: &[CorrelationRow]) -> Result<(), IoError> {
        let path = self.artifact_path("correlation");
        self.write_bytes(&path, &Self::serialize_rows(rows))?;
        info!(path = %path.display(), n_rows = rows.len(), "correlations written");
        Ok(())
    }
}
