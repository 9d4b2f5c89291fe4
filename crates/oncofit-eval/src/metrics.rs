//! Per-trial classification metrics derived from a confusion matrix.

use oncofit_io::Label;
use oncofit_rf::ConfusionMatrix;

/// Cohen's kappa: chance-corrected agreement between truth and prediction.
///
/// Returns 0.0 when expected agreement is 1 (single-cell matrix).
#[must_use]
pub fn cohen_kappa(cm: &ConfusionMatrix) -> f64 {
    let total = cm.total() as f64;
    if total == 0.0 {
        return 0.0;
    }
    let n = cm.n_classes();
    let po = cm.accuracy();
    let mut pe = 0.0;
    for k in 0..n {
        let row_sum: u64 = (0..n).map(|j| cm.get(k, j)).sum();
        let col_sum: u64 = (0..n).map(|i| cm.get(i, k)).sum();
        pe += (row_sum as f64 / total) * (col_sum as f64 / total);
    }
    if (1.0 - pe).abs() < f64::EPSILON {
        return 0.0;
    }
    (po - pe) / (1.0 - pe)
}

/// Multiclass Matthews correlation coefficient.
///
/// Uses the covariance form over class marginals. Returns 0.0 when the
/// denominator vanishes (a marginal covers every sample).
#[must_use]
pub fn matthews_corrcoef(cm: &ConfusionMatrix) -> f64 {
    let n = cm.n_classes();
    let s = cm.total() as f64;
    if s == 0.0 {
        return 0.0;
    }
    let c: f64 = (0..n).map(|k| cm.get(k, k) as f64).sum();

    let mut sum_pt = 0.0;
    let mut sum_p2 = 0.0;
    let mut sum_t2 = 0.0;
    for k in 0..n {
        let p_k: f64 = (0..n).map(|i| cm.get(i, k) as f64).sum();
        let t_k: f64 = (0..n).map(|j| cm.get(k, j) as f64).sum();
        sum_pt += p_k * t_k;
        sum_p2 += p_k * p_k;
        sum_t2 += t_k * t_k;
    }

    let denom = ((s * s - sum_p2) * (s * s - sum_t2)).sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    (c * s - sum_pt) / denom
}

/// Metrics for one completed trial.
///
/// Micro-averaged precision, recall, and F1 coincide with accuracy for
/// single-label multiclass prediction, and are carried as separate
/// fields so the summary keeps its full column set.
#[derive(Debug, Clone)]
pub struct TrialMetrics {
    /// Holdout accuracy.
    pub accuracy: f64,
    /// Out-of-bag accuracy of the final forest.
    pub oob_accuracy: f64,
    /// Cross-validation accuracy on the holdout split.
    pub cv_accuracy: f64,
    /// Cohen's kappa.
    pub kappa: f64,
    /// Micro-averaged F1.
    pub micro_f1: f64,
    /// Matthews correlation coefficient.
    pub mcc: f64,
    /// Micro-averaged precision.
    pub precision: f64,
    /// Micro-averaged recall.
    pub recall: f64,
    /// Precision of the upregulated class.
    pub up_precision: f64,
    /// Recall of the upregulated class.
    pub up_recall: f64,
    /// Precision of the downregulated class.
    pub down_precision: f64,
    /// Recall of the downregulated class.
    pub down_recall: f64,
}

impl TrialMetrics {
    /// Derive a full metric set from one trial's confusion matrix.
    ///
    /// Extreme-class metrics are looked up by label identity, so a
    /// reordering of the per-class metric collection cannot silently
    /// swap the up and down columns.
    #[must_use]
    pub fn from_trial(cm: &ConfusionMatrix, oob_accuracy: f64, cv_accuracy: f64) -> Self {
        let accuracy = cm.accuracy();
        let class_metrics = cm.class_metrics();
        let lookup = |label: Label| {
            class_metrics
                .iter()
                .find(|m| m.class == label.class_index())
                .map(|m| (m.precision, m.recall))
                .unwrap_or((0.0, 0.0))
        };
        let (up_precision, up_recall) = lookup(Label::Up);
        let (down_precision, down_recall) = lookup(Label::Down);

        Self {
            accuracy,
            oob_accuracy,
            cv_accuracy,
            kappa: cohen_kappa(cm),
            micro_f1: accuracy,
            mcc: matthews_corrcoef(cm),
            precision: accuracy,
            recall: accuracy,
            up_precision,
            up_recall,
            down_precision,
            down_recall,
        }
    }
}
