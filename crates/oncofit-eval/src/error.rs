//! Error types for the evaluation harness.

use oncofit_io::IoError;
use oncofit_rf::RfError;

/// Errors from trial aggregation, ablation sweeps, and diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Returned when every trial of a run failed.
    #[error("no trial completed ({n_failed} failed)")]
    NoCompletedTrials {
        /// Number of trials that failed.
        n_failed: usize,
    },

    /// Returned when the requested number of trials is zero.
    #[error("iteration count must be at least 1")]
    InvalidIterations,

    /// Returned when a feature-group manifest names an unknown column.
    #[error("manifest names unknown feature column \"{column}\"")]
    UnknownManifestColumn {
        /// The unmatched column name.
        column: String,
    },

    /// Returned when a feature-group manifest resolves to zero columns.
    #[error("manifest for group \"{group}\" matches no feature columns")]
    EmptyManifest {
        /// Display name of the group.
        group: String,
    },

    /// Forwarded model training or evaluation error.
    #[error(transparent)]
    Rf(#[from] RfError),

    /// Forwarded dataset preparation error.
    #[error(transparent)]
    Io(#[from] IoError),
}
