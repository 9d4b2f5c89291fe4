/// Errors from ensemble training and evaluation.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when max_features resolves to 0 or exceeds n_features.
    #[error("max_features resolved to {max_features}, but must be in [1, {n_features}]")]
    InvalidMaxFeatures {
        /// The resolved max_features value.
        max_features: usize,
        /// The number of features in the dataset.
        n_features: usize,
    },

    /// Returned when bootstrap_fraction is not in (0.0, 1.0].
    #[error("bootstrap_fraction must be in (0.0, 1.0], got {fraction}")]
    InvalidBootstrapFraction {
        /// The invalid bootstrap_fraction value provided.
        fraction: f64,
    },

    /// Returned when n_folds is less than 2.
    #[error("n_folds must be at least 2, got {n_folds}")]
    InvalidFoldCount {
        /// The invalid n_folds value provided.
        n_folds: usize,
    },

    /// Returned when the growth schedule cannot produce a single fit.
    #[error(
        "growth schedule must satisfy 1 <= initial <= max with step >= 1, \
         got initial={initial}, max={max}, step={step}"
    )]
    InvalidGrowthSchedule {
        /// Initial estimator count.
        initial: usize,
        /// Maximum estimator count.
        max: usize,
        /// Estimator count increment per refit.
        step: usize,
    },

    /// Returned when the training dataset has zero samples.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training dataset has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a sample has a different number of features than expected.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the sample.
        got: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when a sample has a different number of features at prediction time.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when a CV fold's training partition has fewer than 2 classes.
    #[error("fold {fold} is degenerate: only {n_classes_present} class(es) present in its training partition")]
    DegenerateFold {
        /// Zero-based fold index.
        fold: usize,
        /// Number of distinct classes present.
        n_classes_present: usize,
    },

    /// Returned when the held-out evaluation set has fewer than 2 classes.
    #[error("held-out set is degenerate: only {n_classes_present} class(es) present")]
    DegenerateHoldout {
        /// Number of distinct classes present.
        n_classes_present: usize,
    },

    /// Returned when OOB evaluation fails (no sample has any OOB tree).
    #[error("OOB evaluation failed: {reason}")]
    OobEvaluationFailed {
        /// Human-readable description of why OOB evaluation failed.
        reason: String,
    },

    /// Returned when merging confusion matrices of different sizes.
    #[error("cannot merge confusion matrices: {left} classes vs {right} classes")]
    ConfusionSizeMismatch {
        /// Class count of the accumulating matrix.
        left: usize,
        /// Class count of the matrix being merged in.
        right: usize,
    },
}
