//! Repeated stochastic trials with confusion-matrix accumulation.

use oncofit_io::{Dataset, Label, Target, robust_scale, train_test_split};
use oncofit_rf::{ConfusionMatrix, EnsembleTrainer, GrowthSchedule};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{info, instrument, warn};

use crate::error::EvalError;
use crate::metrics::TrialMetrics;
use crate::stats::SummaryStatistics;

/// Runs a target's evaluation as many independent trials and accumulates
/// their confusion matrices.
///
/// Each trial draws a fresh random train/test split, trains through the
/// growth schedule, and scores the holdout. Trials run in parallel;
/// accumulation is element-wise addition, so the report is independent
/// of completion order. A failed trial is logged and dropped rather
/// than cancelling its siblings.
#[derive(Debug, Clone)]
pub struct TrialAggregator {
    iterations: usize,
    test_fraction: f64,
    schedule: GrowthSchedule,
    cv_folds: usize,
    seed: u64,
}

/// The accumulated outcome of one aggregated run.
#[derive(Debug)]
pub struct TrialReport {
    /// Element-wise sum of per-trial confusion matrices.
    pub confusion: ConfusionMatrix,
    /// Row-normalized accumulated confusion matrix.
    pub normalized: Vec<Vec<f64>>,
    /// Metric means and the accuracy-series t-test.
    pub summary: SummaryStatistics,
    /// Number of trials that completed.
    pub n_trials_completed: usize,
    /// Number of trials that failed.
    pub n_failed_trials: usize,
}

impl TrialAggregator {
    /// Create an aggregator running `iterations` trials with a 30%
    /// holdout, the default growth schedule, and 10-fold CV.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidIterations`] when `iterations` is zero.
    pub fn new(iterations: usize) -> Result<Self, EvalError> {
        if iterations == 0 {
            return Err(EvalError::InvalidIterations);
        }
        Ok(Self {
            iterations,
            test_fraction: 0.3,
            schedule: GrowthSchedule::default(),
            cv_folds: 10,
            seed: 42,
        })
    }

    /// Set the holdout fraction drawn per trial.
    #[must_use]
    pub fn with_test_fraction(mut self, test_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self
    }

    /// Set the tree-count growth schedule used by every trial.
    #[must_use]
    pub fn with_schedule(mut self, schedule: GrowthSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Set the number of cross-validation folds per trial.
    #[must_use]
    pub fn with_cv_folds(mut self, cv_folds: usize) -> Self {
        self.cv_folds = cv_folds;
        self
    }

    /// Set the master random seed. Per-trial seeds derive from it, so
    /// two runs with the same seed produce identical reports.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run the trials and accumulate their results.
    ///
    /// The dataset is robust-scaled once before any split is drawn.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::NoCompletedTrials`] when every trial failed,
    /// or forwards the preparation error if scaling-independent setup
    /// fails (for example an invalid holdout fraction).
    #[instrument(skip_all, fields(cancer, target = %target, iterations = self.iterations))]
    pub fn run(
        &self,
        dataset: &Dataset,
        target: &Target,
        cancer: &str,
    ) -> Result<TrialReport, EvalError> {
        let mut scaled = dataset.clone();
        robust_scale(&mut scaled);

        // Per-trial seeds drawn up front from the master RNG.
        let mut master_rng = ChaCha8Rng::seed_from_u64(self.seed);
        let trial_seeds: Vec<u64> = (0..self.iterations).map(|_| master_rng.r#gen()).collect();

        let outcomes: Vec<Result<(ConfusionMatrix, TrialMetrics), EvalError>> = trial_seeds
            .into_par_iter()
            .map(|seed| self.run_trial(&scaled, seed))
            .collect();

        let n_classes = Label::ALL.len();
        let mut confusion = ConfusionMatrix::zeros(n_classes);
        let mut trials = Vec::with_capacity(self.iterations);
        let mut n_failed = 0usize;

        for (trial, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok((cm, metrics)) => {
                    confusion.merge(&cm)?;
                    trials.push(metrics);
                }
                Err(err) => {
                    warn!(trial, error = %err, "trial failed, dropping");
                    n_failed += 1;
                }
            }
        }

        if trials.is_empty() {
            return Err(EvalError::NoCompletedTrials { n_failed });
        }

        let summary = SummaryStatistics::from_trials(cancer, target, &trials, n_failed);
        info!(
            n_completed = trials.len(),
            n_failed,
            mean_accuracy = summary.mean_accuracy,
            "trial aggregation complete"
        );

        Ok(TrialReport {
            normalized: confusion.row_normalized(),
            confusion,
            n_trials_completed: summary.n_trials,
            n_failed_trials: n_failed,
            summary,
        })
    }

    fn run_trial(
        &self,
        dataset: &Dataset,
        seed: u64,
    ) -> Result<(ConfusionMatrix, TrialMetrics), EvalError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let split = train_test_split(dataset, self.test_fraction, &mut rng)?;

        let trainer = EnsembleTrainer::new()
            .with_schedule(self.schedule)
            .with_cv_folds(self.cv_folds)
            .with_seed(seed);
        let outcome = trainer.train(
            split.train.features(),
            &split.train.labels_as_indices(),
            split.test.features(),
            &split.test.labels_as_indices(),
        )?;

        let cm = ConfusionMatrix::from_labels(
            &split.test.labels_as_indices(),
            &outcome.predictions,
            Label::ALL.len(),
        )?;
        let metrics = TrialMetrics::from_trial(&cm, outcome.oob_accuracy, outcome.cv_accuracy);
        Ok((cm, metrics))
    }
}
