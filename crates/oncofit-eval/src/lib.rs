//! Repeated stochastic evaluation of oncofit models.
//!
//! Aggregates many randomized train/test trials into an accumulated
//! confusion matrix and summary statistics, sweeps feature groups and
//! held-out cell lines over a coarse grid, and computes post-hoc
//! diagnostics (ordinal gradient correlation, one-vs-rest AUROC).

mod ablation;
mod diagnostics;
mod error;
mod metrics;
mod stats;
mod trials;

pub use ablation::{
    AblationEngine, AblationReport, AblationResult, FeatureGroup, GroupManifest, SkipReason,
    SkippedGroup,
};
pub use diagnostics::{
    AurocSummary, FeatureCorrelation, class_median_correlation, compute_auroc,
};
pub use error::EvalError;
pub use metrics::{TrialMetrics, cohen_kappa, matthews_corrcoef};
pub use stats::{P_VALUE_FLOOR, SummaryStatistics, mean, one_sample_t_test, sample_std};
pub use trials::{TrialAggregator, TrialReport};
