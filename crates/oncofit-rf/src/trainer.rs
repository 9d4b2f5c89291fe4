//! Ensemble trainer: grows the forest through a tree-count schedule and
//! evaluates the final fit on a holdout split.

use tracing::{debug, info, instrument};

use crate::error::RfError;
use crate::eval::CrossValidation;
use crate::forest::{MaxFeatures, RandomForest, RandomForestConfig};

/// A schedule of ensemble sizes to train through.
///
/// Training refits the whole forest at each size and keeps only the
/// final fit. Intermediate fits exist to surface OOB drift across
/// ensemble sizes in the logs.
#[derive(Debug, Clone, Copy)]
pub struct GrowthSchedule {
    initial_trees: usize,
    max_trees: usize,
    tree_step: usize,
}

impl GrowthSchedule {
    /// Create a schedule from `initial` trees up to `max` in steps of `step`.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidGrowthSchedule`] when `initial` is zero,
    /// `step` is zero, or `initial > max`.
    pub fn new(initial: usize, max: usize, step: usize) -> Result<Self, RfError> {
        if initial == 0 || step == 0 || initial > max {
            return Err(RfError::InvalidGrowthSchedule { initial, max, step });
        }
        Ok(Self {
            initial_trees: initial,
            max_trees: max,
            tree_step: step,
        })
    }

    /// The tree counts the schedule visits, in order. Never empty.
    #[must_use]
    pub fn tree_counts(&self) -> Vec<usize> {
        let mut counts = Vec::new();
        let mut n = self.initial_trees;
        while n <= self.max_trees {
            counts.push(n);
            n += self.tree_step;
        }
        counts
    }

    /// The final (largest) tree count the schedule reaches.
    #[must_use]
    pub fn final_trees(&self) -> usize {
        *self
            .tree_counts()
            .last()
            .expect("validated schedule yields at least one count")
    }
}

impl Default for GrowthSchedule {
    /// Doubling from 64 to 128 trees.
    fn default() -> Self {
        Self {
            initial_trees: 64,
            max_trees: 128,
            tree_step: 64,
        }
    }
}

/// Trains a forest through a [`GrowthSchedule`] and evaluates it.
#[derive(Debug, Clone)]
pub struct EnsembleTrainer {
    schedule: GrowthSchedule,
    max_features: MaxFeatures,
    cv_folds: usize,
    seed: u64,
}

/// The final fit plus its holdout evaluation.
#[derive(Debug)]
pub struct TrainerOutcome {
    /// The forest from the last schedule step.
    pub forest: RandomForest,
    /// Predicted class indices for the holdout samples.
    pub predictions: Vec<usize>,
    /// OOB accuracy of the final forest.
    pub oob_accuracy: f64,
    /// Mean k-fold cross-validation accuracy measured on the holdout split.
    pub cv_accuracy: f64,
}

impl Default for EnsembleTrainer {
    fn default() -> Self {
        Self::new()
    }
}

impl EnsembleTrainer {
    /// Create a trainer with the default schedule, sqrt feature
    /// subsampling, and 10-fold cross-validation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schedule: GrowthSchedule::default(),
            max_features: MaxFeatures::Sqrt,
            cv_folds: 10,
            seed: 42,
        }
    }

    /// Set the growth schedule.
    #[must_use]
    pub fn with_schedule(mut self, schedule: GrowthSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Set the per-split feature subsampling strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the number of cross-validation folds.
    #[must_use]
    pub fn with_cv_folds(mut self, cv_folds: usize) -> Self {
        self.cv_folds = cv_folds;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Train through the schedule and evaluate the final fit on the holdout.
    ///
    /// Cross-validation deliberately runs on the holdout split with the
    /// final forest configuration, so `cv_accuracy` measures holdout
    /// self-consistency rather than train-set fit.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::DegenerateHoldout`] | Holdout has fewer than two classes |
    /// | [`RfError::InvalidFoldCount`] | Holdout smaller than `cv_folds` |
    /// | Other RF errors | From underlying training |
    #[instrument(skip_all, fields(n_train = train_features.len(), n_test = test_features.len()))]
    pub fn train(
        &self,
        train_features: &[Vec<f64>],
        train_labels: &[usize],
        test_features: &[Vec<f64>],
        test_labels: &[usize],
    ) -> Result<TrainerOutcome, RfError> {
        let n_classes_present = {
            let mut seen = std::collections::BTreeSet::new();
            seen.extend(test_labels.iter().copied());
            seen.len()
        };
        if n_classes_present < 2 {
            return Err(RfError::DegenerateHoldout { n_classes_present });
        }

        let mut forest: Option<RandomForest> = None;
        for (step, n_trees) in self.schedule.tree_counts().into_iter().enumerate() {
            let config = RandomForestConfig::new(n_trees)?
                .with_max_features(self.max_features)
                .with_seed(self.seed.wrapping_add(step as u64));
            let fitted = config.fit(train_features, train_labels)?;
            debug!(
                n_trees,
                oob_accuracy = fitted.oob_score().accuracy,
                "schedule step complete"
            );
            forest = Some(fitted);
        }
        let forest = forest.expect("validated schedule yields at least one count");

        let predictions = forest.predict_batch(test_features)?;
        let oob_accuracy = forest.oob_score().accuracy;

        let final_config = RandomForestConfig::new(self.schedule.final_trees())?
            .with_max_features(self.max_features)
            .with_seed(self.seed);
        let cv = CrossValidation::new(self.cv_folds)?.with_seed(self.seed);
        let cv_result = cv.evaluate(&final_config, test_features, test_labels)?;

        info!(
            oob_accuracy,
            cv_accuracy = cv_result.mean_accuracy,
            "ensemble training complete"
        );

        Ok(TrainerOutcome {
            forest,
            predictions,
            oob_accuracy,
            cv_accuracy: cv_result.mean_accuracy,
        })
    }
}
