//! CSV input/output and dataset preparation for oncofit.
//!
//! Reads labelled gene/cell-line feature tables, prepares them for
//! training (robust scaling, holdout splitting, minority oversampling),
//! and writes evaluation artifacts as CSV files.

mod domain;
mod error;
mod prep;
mod reader;
mod writer;

pub use domain::{CellLine, Dataset, GeneId, Label, RunName, Split, Target};
pub use error::IoError;
pub use prep::{oversample, robust_scale, train_test_split};
pub use reader::{DatasetReader, cancer_context};
pub use writer::{
    AblationRow, AblationSkipRow, AurocRow, CorrelationRow, ResultWriter, SummaryRow,
};
