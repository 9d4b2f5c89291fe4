//! Confusion matrix with accumulation, normalization, and per-class metrics.

use std::fmt;

use crate::error::RfError;

/// A confusion matrix for multi-class classification.
///
/// Entry `matrix[true_class][predicted_class]` counts how many samples
/// with true label `true_class` were predicted as `predicted_class`.
/// Matrices accumulate across trials via [`ConfusionMatrix::merge`];
/// merging is element-wise integer addition, so the accumulated result
/// is independent of trial execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    matrix: Vec<Vec<u64>>,
    n_classes: usize,
}

/// Per-class precision, recall, and F1 score.
#[derive(Debug, Clone)]
pub struct ClassMetrics {
    /// The class index.
    pub class: usize,
    /// Precision: TP / (TP + FP). 0.0 if no predictions for this class.
    pub precision: f64,
    /// Recall: TP / (TP + FN). 0.0 if no true samples for this class.
    pub recall: f64,
    /// F1: 2 * precision * recall / (precision + recall). 0.0 if both are zero.
    pub f1: f64,
    /// Number of true samples in this class.
    pub support: u64,
}

impl ConfusionMatrix {
    /// Create an all-zero matrix for `n_classes` classes.
    #[must_use]
    pub fn zeros(n_classes: usize) -> Self {
        Self {
            matrix: vec![vec![0; n_classes]; n_classes],
            n_classes,
        }
    }

    /// Build a confusion matrix from true and predicted labels.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::EmptyDataset`] when zero labels are provided.
    pub fn from_labels(
        true_labels: &[usize],
        predicted: &[usize],
        n_classes: usize,
    ) -> Result<Self, RfError> {
        if true_labels.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        let mut cm = Self::zeros(n_classes);
        for (&t, &p) in true_labels.iter().zip(predicted.iter()) {
            cm.matrix[t][p] += 1;
        }
        Ok(cm)
    }

    /// Record a single (true, predicted) observation.
    pub fn record(&mut self, true_class: usize, predicted_class: usize) {
        self.matrix[true_class][predicted_class] += 1;
    }

    /// Accumulate another matrix into this one by element-wise addition.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::ConfusionSizeMismatch`] when class counts differ.
    pub fn merge(&mut self, other: &ConfusionMatrix) -> Result<(), RfError> {
        if self.n_classes != other.n_classes {
            return Err(RfError::ConfusionSizeMismatch {
                left: self.n_classes,
                right: other.n_classes,
            });
        }
        for (row, other_row) in self.matrix.iter_mut().zip(&other.matrix) {
            for (cell, &v) in row.iter_mut().zip(other_row) {
                *cell += v;
            }
        }
        Ok(())
    }

    /// Total number of observations recorded.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.matrix.iter().flat_map(|row| row.iter()).sum()
    }

    /// Overall accuracy: proportion of correct predictions.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let correct: u64 = (0..self.n_classes).map(|i| self.matrix[i][i]).sum();
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        }
    }

    /// Row-stochastic normalization: each row divided by its row sum.
    ///
    /// A row is the recall distribution for that true class. Rows with a
    /// zero sum yield NaN in every cell by design (0/0), mirroring the
    /// accumulated-report convention downstream consumers expect.
    #[must_use]
    pub fn row_normalized(&self) -> Vec<Vec<f64>> {
        self.matrix
            .iter()
            .map(|row| {
                let sum: u64 = row.iter().sum();
                row.iter().map(|&v| v as f64 / sum as f64).collect()
            })
            .collect()
    }

    /// Per-class precision, recall, F1, and support.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        (0..self.n_classes)
            .map(|c| {
                let tp = self.matrix[c][c];
                let fp: u64 = (0..self.n_classes)
                    .filter(|&i| i != c)
                    .map(|i| self.matrix[i][c])
                    .sum();
                let fn_: u64 = (0..self.n_classes)
                    .filter(|&j| j != c)
                    .map(|j| self.matrix[c][j])
                    .sum();
                let support = tp + fn_;
                let precision = if tp + fp == 0 {
                    0.0
                } else {
                    tp as f64 / (tp + fp) as f64
                };
                let recall = if support == 0 {
                    0.0
                } else {
                    tp as f64 / support as f64
                };
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Return the count at `(true_class, predicted_class)`.
    #[must_use]
    pub fn get(&self, true_class: usize, predicted_class: usize) -> u64 {
        self.matrix[true_class][predicted_class]
    }

    /// Return the underlying matrix rows.
    #[must_use]
    pub fn as_rows(&self) -> &[Vec<u64>] {
        &self.matrix
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for j in 0..self.n_classes {
            write!(f, " pred_{j:>3}")?;
        }
        writeln!(f)?;
        for (i, row) in self.matrix.iter().enumerate() {
            write!(f, "true_{i:>3}")?;
            for val in row {
                write!(f, " {val:>7}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions() {
        let true_labels = vec![0, 0, 1, 1, 2, 2];
        let predicted = vec![0, 0, 1, 1, 2, 2];
        let cm = ConfusionMatrix::from_labels(&true_labels, &predicted, 3).unwrap();
        assert!((cm.accuracy() - 1.0).abs() < f64::EPSILON);
        for m in cm.class_metrics() {
            assert!((m.precision - 1.0).abs() < f64::EPSILON);
            assert!((m.recall - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn known_confusion_matrix() {
        // True: [0,0,0, 1,1,1, 2,2,2]
        // Pred: [0,0,1, 1,1,2, 2,2,0]
        let true_labels = vec![0, 0, 0, 1, 1, 1, 2, 2, 2];
        let predicted = vec![0, 0, 1, 1, 1, 2, 2, 2, 0];
        let cm = ConfusionMatrix::from_labels(&true_labels, &predicted, 3).unwrap();

        let metrics = cm.class_metrics();
        assert!((metrics[0].precision - 2.0 / 3.0).abs() < 1e-10);
        assert!((metrics[0].recall - 2.0 / 3.0).abs() < 1e-10);
        assert_eq!(metrics[0].support, 3);
        assert!((cm.accuracy() - 6.0 / 9.0).abs() < 1e-10);
    }

    #[test]
    fn empty_labels_error() {
        let err = ConfusionMatrix::from_labels(&[], &[], 3).unwrap_err();
        assert!(matches!(err, RfError::EmptyDataset));
    }

    #[test]
    fn merge_is_element_wise_addition() {
        let a = ConfusionMatrix::from_labels(&[0, 1], &[0, 1], 3).unwrap();
        let b = ConfusionMatrix::from_labels(&[0, 2], &[1, 2], 3).unwrap();
        let mut acc = ConfusionMatrix::zeros(3);
        acc.merge(&a).unwrap();
        acc.merge(&b).unwrap();
        assert_eq!(acc.get(0, 0), 1);
        assert_eq!(acc.get(0, 1), 1);
        assert_eq!(acc.get(1, 1), 1);
        assert_eq!(acc.get(2, 2), 1);
        assert_eq!(acc.total(), 4);
    }

    #[test]
    fn merge_order_independent() {
        let parts = vec![
            ConfusionMatrix::from_labels(&[0, 1, 2], &[0, 1, 2], 3).unwrap(),
            ConfusionMatrix::from_labels(&[0, 0], &[1, 2], 3).unwrap(),
            ConfusionMatrix::from_labels(&[2, 2, 1], &[2, 0, 1], 3).unwrap(),
        ];
        let mut forward = ConfusionMatrix::zeros(3);
        for p in &parts {
            forward.merge(p).unwrap();
        }
        let mut backward = ConfusionMatrix::zeros(3);
        for p in parts.iter().rev() {
            backward.merge(p).unwrap();
        }
        assert_eq!(forward, backward);
    }

    #[test]
    fn merge_size_mismatch_error() {
        let mut a = ConfusionMatrix::zeros(3);
        let b = ConfusionMatrix::zeros(2);
        let err = a.merge(&b).unwrap_err();
        assert!(matches!(
            err,
            RfError::ConfusionSizeMismatch { left: 3, right: 2 }
        ));
    }

    #[test]
    fn row_normalized_rows_sum_to_one() {
        let true_labels = vec![0, 0, 0, 1, 1, 1, 2, 2, 2];
        let predicted = vec![0, 0, 1, 1, 1, 2, 2, 2, 0];
        let cm = ConfusionMatrix::from_labels(&true_labels, &predicted, 3).unwrap();
        for row in cm.row_normalized() {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn row_normalized_zero_sum_row_is_nan() {
        // Class 2 never appears as a true label.
        let cm = ConfusionMatrix::from_labels(&[0, 1], &[0, 1], 3).unwrap();
        let normalized = cm.row_normalized();
        assert!(normalized[2].iter().all(|v| v.is_nan()));
        assert!((normalized[0][0] - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn display_formatting() {
        let cm = ConfusionMatrix::from_labels(&[0, 1], &[0, 1], 2).unwrap();
        let output = format!("{cm}");
        assert!(output.contains("pred_"));
        assert!(output.contains("true_"));
    }
}
