//! Random Forest classification for repeated stochastic evaluation.
//!
//! Provides a hand-rolled Random Forest classifier with CART decision trees,
//! Gini/Entropy split criteria, parallel training via rayon, out-of-bag
//! evaluation, k-fold cross-validation, confusion matrices, and an ensemble
//! trainer that grows the forest through a tree-count schedule.

mod confusion;
mod error;
mod eval;
mod forest;
mod node;
mod oob;
mod split;
mod trainer;
mod tree;

pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use error::RfError;
pub use eval::{CrossValidation, CrossValidationResult};
pub use forest::{MaxFeatures, RandomForest, RandomForestConfig};
pub use node::{FeatureIndex, Node, NodeIndex};
pub use oob::OobScore;
pub use split::SplitCriterion;
pub use trainer::{EnsembleTrainer, GrowthSchedule, TrainerOutcome};
pub use tree::{DecisionTree, DecisionTreeConfig};
