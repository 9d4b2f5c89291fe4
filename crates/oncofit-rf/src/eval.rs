//! K-fold cross-validation for Random Forest.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::error::RfError;
use crate::forest::RandomForestConfig;

/// Cross-validation configuration.
///
/// Construct via [`CrossValidation::new`], then chain `with_seed` if desired.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    n_folds: usize,
    seed: u64,
}

/// Results of k-fold cross-validation.
#[derive(Debug)]
pub struct CrossValidationResult {
    /// Accuracy for each fold.
    pub fold_accuracies: Vec<f64>,
    /// Mean accuracy across folds.
    pub mean_accuracy: f64,
    /// Standard deviation of fold accuracies.
    pub std_accuracy: f64,
    /// Number of folds.
    pub n_folds: usize,
    /// Total number of samples.
    pub n_samples: usize,
}

impl CrossValidation {
    /// Create a new cross-validation config with the given number of folds.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, RfError> {
        if n_folds < 2 {
            return Err(RfError::InvalidFoldCount { n_folds });
        }
        Ok(Self { n_folds, seed: 42 })
    }

    /// Set the random seed for fold shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run k-fold cross-validation.
    ///
    /// Samples are shuffled once and assigned to folds round-robin. Each
    /// fold trains a forest on the remaining folds and scores on the
    /// held-out fold.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | Zero samples |
    /// | [`RfError::InvalidFoldCount`] | More folds than samples |
    /// | [`RfError::DegenerateFold`] | A fold's training portion has fewer than two classes |
    /// | Other RF errors | From underlying training |
    #[instrument(skip_all, fields(n_folds = self.n_folds, n_samples = features.len()))]
    pub fn evaluate(
        &self,
        config: &RandomForestConfig,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<CrossValidationResult, RfError> {
        if features.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        let n_samples = features.len();
        if n_samples < self.n_folds {
            return Err(RfError::InvalidFoldCount {
                n_folds: self.n_folds,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..n_samples).collect();
        order.shuffle(&mut rng);

        let mut fold_assignments = vec![0usize; n_samples];
        for (pos, &idx) in order.iter().enumerate() {
            fold_assignments[idx] = pos % self.n_folds;
        }

        let mut fold_accuracies = Vec::with_capacity(self.n_folds);

        for fold in 0..self.n_folds {
            let mut train_features = Vec::new();
            let mut train_labels = Vec::new();
            let mut test_features = Vec::new();
            let mut test_labels = Vec::new();

            for (i, &assigned) in fold_assignments.iter().enumerate() {
                if assigned == fold {
                    test_features.push(features[i].clone());
                    test_labels.push(labels[i]);
                } else {
                    train_features.push(features[i].clone());
                    train_labels.push(labels[i]);
                }
            }

            let n_classes_present = {
                let mut seen = std::collections::BTreeSet::new();
                seen.extend(train_labels.iter().copied());
                seen.len()
            };
            if n_classes_present < 2 {
                return Err(RfError::DegenerateFold {
                    fold,
                    n_classes_present,
                });
            }

            // Each fold trains with its own derived seed.
            let fold_config = config
                .clone()
                .with_seed(config.seed().wrapping_add(fold as u64));
            let forest = fold_config.fit(&train_features, &train_labels)?;
            let fold_accuracy = forest.score(&test_features, &test_labels)?;
            fold_accuracies.push(fold_accuracy);

            debug!(fold, accuracy = fold_accuracy, "fold completed");
        }

        let mean_accuracy = fold_accuracies.iter().sum::<f64>() / self.n_folds as f64;
        let std_accuracy = {
            let variance = fold_accuracies
                .iter()
                .map(|&a| (a - mean_accuracy).powi(2))
                .sum::<f64>()
                / self.n_folds as f64;
            variance.sqrt()
        };

        Ok(CrossValidationResult {
            fold_accuracies,
            mean_accuracy,
            std_accuracy,
            n_folds: self.n_folds,
            n_samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::MaxFeatures;

    fn make_separable_data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            features.push(vec![i as f64 * 0.1, 0.5]);
            labels.push(0);
        }
        for i in 0..30 {
            features.push(vec![10.0 + i as f64 * 0.1, 0.5]);
            labels.push(1);
        }
        for i in 0..30 {
            features.push(vec![20.0 + i as f64 * 0.1, 0.5]);
            labels.push(2);
        }
        (features, labels)
    }

    #[test]
    fn five_fold_separable_accuracy() {
        let (features, labels) = make_separable_data();
        let rf_config = RandomForestConfig::new(20)
            .unwrap()
            .with_max_features(MaxFeatures::All)
            .with_seed(42);
        let cv = CrossValidation::new(5).unwrap().with_seed(42);
        let result = cv.evaluate(&rf_config, &features, &labels).unwrap();

        assert!(
            result.mean_accuracy > 0.8,
            "mean_accuracy = {}",
            result.mean_accuracy
        );
        assert_eq!(result.fold_accuracies.len(), 5);
        assert_eq!(result.n_folds, 5);
        assert_eq!(result.n_samples, 90);
    }

    #[test]
    fn fold_count_matches() {
        let (features, labels) = make_separable_data();
        let rf_config = RandomForestConfig::new(5).unwrap().with_seed(42);
        let cv = CrossValidation::new(3).unwrap();
        let result = cv.evaluate(&rf_config, &features, &labels).unwrap();
        assert_eq!(result.fold_accuracies.len(), 3);
    }

    #[test]
    fn invalid_fold_count() {
        assert!(CrossValidation::new(0).is_err());
        assert!(CrossValidation::new(1).is_err());
    }

    #[test]
    fn more_folds_than_samples_error() {
        let features = vec![vec![1.0], vec![2.0], vec![10.0]];
        let labels = vec![0, 0, 1];
        let rf_config = RandomForestConfig::new(5).unwrap();
        let cv = CrossValidation::new(5).unwrap();
        let err = cv.evaluate(&rf_config, &features, &labels).unwrap_err();
        assert!(matches!(err, RfError::InvalidFoldCount { n_folds: 5 }));
    }

    #[test]
    fn single_class_training_portion_error() {
        // All samples share one label, so every training portion is degenerate.
        let features: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let labels = vec![0; 10];
        let rf_config = RandomForestConfig::new(5).unwrap();
        let cv = CrossValidation::new(2).unwrap();
        let err = cv.evaluate(&rf_config, &features, &labels).unwrap_err();
        assert!(matches!(err, RfError::DegenerateFold { .. }));
    }
}
