use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::RfError;
use crate::node::{Node, NodeIndex};
use crate::split::{SplitCriterion, find_best_split};

/// Configuration for a single CART decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values (Gini, unlimited depth,
    /// min_samples_split 2, min_samples_leaf 1, all features, seed 42).
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each leaf after a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the maximum number of features considered at each split.
    /// `None` means all features.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Train a decision tree on the provided row-major dataset.
    ///
    /// `features[sample_idx][feature_idx]` — row-major layout.
    /// `labels[sample_idx]` — zero-based class labels.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | `features` is empty |
    /// | [`RfError::ZeroFeatures`] | rows have zero feature columns |
    /// | [`RfError::FeatureCountMismatch`] | rows have inconsistent lengths |
    /// | [`RfError::InvalidMaxFeatures`] | `max_features` resolves outside [1, n_features] |
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<DecisionTree, RfError> {
        if features.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        let n_samples = features.len();
        let n_features = features[0].len();
        if n_features == 0 {
            return Err(RfError::ZeroFeatures);
        }
        for (sample_index, row) in features.iter().enumerate() {
            if row.len() != n_features {
                return Err(RfError::FeatureCountMismatch {
                    expected: n_features,
                    got: row.len(),
                    sample_index,
                });
            }
        }

        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }

        let n_classes = labels.iter().max().copied().unwrap_or(0) + 1;

        // Column-major layout for the split scan.
        let col_features: Vec<Vec<f64>> = (0..n_features)
            .map(|feat_idx| features.iter().map(|row| row[feat_idx]).collect())
            .collect();

        let sample_indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut arena: Vec<Node> = Vec::new();

        build_tree(
            &col_features,
            labels,
            &sample_indices,
            n_classes,
            self,
            0,
            &mut rng,
            &mut arena,
            max_features,
        );

        debug!(n_nodes = arena.len(), n_samples, "decision tree built");

        Ok(DecisionTree {
            nodes: arena,
            n_features,
            n_classes,
        })
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively build the arena-based decision tree.
///
/// Returns the [`NodeIndex`] of the node just created in `arena`.
#[allow(clippy::too_many_arguments)]
fn build_tree(
    col_features: &[Vec<f64>],
    labels: &[usize],
    sample_indices: &[usize],
    n_classes: usize,
    config: &DecisionTreeConfig,
    depth: usize,
    rng: &mut ChaCha8Rng,
    arena: &mut Vec<Node>,
    max_features: usize,
) -> NodeIndex {
    let n_samples = sample_indices.len();

    let mut class_counts = vec![0usize; n_classes];
    for &si in sample_indices {
        class_counts[labels[si]] += 1;
    }
    let impurity = config.criterion.impurity(&class_counts, n_samples);

    let make_leaf = |arena: &mut Vec<Node>| -> NodeIndex {
        let total = n_samples as f64;
        let distribution: Vec<f64> = class_counts.iter().map(|&c| c as f64 / total).collect();
        let prediction = class_counts
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.cmp(b.1))
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        let idx = arena.len();
        arena.push(Node::Leaf {
            prediction,
            distribution,
            n_samples,
        });
        NodeIndex::new(idx)
    };

    let depth_exceeded = config.max_depth.is_some_and(|max_d| depth >= max_d);
    if n_samples < config.min_samples_split || impurity == 0.0 || depth_exceeded {
        return make_leaf(arena);
    }

    let split = match find_best_split(
        col_features,
        labels,
        sample_indices,
        n_classes,
        config.criterion,
        max_features,
        config.min_samples_leaf,
        rng,
    ) {
        Some(s) => s,
        None => return make_leaf(arena),
    };

    // Arena pattern: reserve index, recurse, then overwrite with the split.
    let node_idx = arena.len();
    arena.push(Node::Leaf {
        prediction: 0,
        distribution: vec![0.0; n_classes],
        n_samples,
    });

    let left = build_tree(
        col_features,
        labels,
        &split.left_indices,
        n_classes,
        config,
        depth + 1,
        rng,
        arena,
        max_features,
    );
    let right = build_tree(
        col_features,
        labels,
        &split.right_indices,
        n_classes,
        config,
        depth + 1,
        rng,
        arena,
        max_features,
    );

    arena[node_idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left,
        right,
    };

    NodeIndex::new(node_idx)
}

/// A fitted CART decision tree.
///
/// Stored as an arena-based `Vec<Node>` with index references for
/// cache-friendly traversal.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl DecisionTree {
    /// Predict the class label for a single sample.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when
    /// `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        match &self.nodes[self.traverse(sample)] {
            Node::Leaf { prediction, .. } => Ok(*prediction),
            Node::Split { .. } => unreachable!("traverse always ends at a leaf"),
        }
    }

    /// Return the class probability distribution for a single sample.
    ///
    /// The returned `Vec` has length `n_classes`, summing to 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when
    /// `sample.len() != n_features`.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<Vec<f64>, RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        match &self.nodes[self.traverse(sample)] {
            Node::Leaf { distribution, .. } => Ok(distribution.clone()),
            Node::Split { .. } => unreachable!("traverse always ends at a leaf"),
        }
    }

    /// Return the total number of nodes in the tree.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Traverse the tree from the root and return the arena index of the leaf.
    fn traverse(&self, sample: &[f64]) -> usize {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return idx,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if sample[feature.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_dataset_error() {
        let err = DecisionTreeConfig::new()
            .fit(&[], &[])
            .unwrap_err();
        assert!(matches!(err, RfError::EmptyDataset));
    }

    #[test]
    fn pure_dataset_single_leaf() {
        let features = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let labels = vec![0, 0, 0];
        let tree = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict(&[2.0, 3.0]).unwrap(), 0);
    }

    #[test]
    fn linearly_separable_correct_split() {
        let features = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
            vec![10.0, 0.0],
            vec![11.0, 0.0],
            vec![12.0, 0.0],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let tree = DecisionTreeConfig::new()
            .with_seed(42)
            .fit(&features, &labels)
            .unwrap();
        assert_eq!(tree.predict(&[2.0, 0.0]).unwrap(), 0);
        assert_eq!(tree.predict(&[11.0, 0.0]).unwrap(), 1);
    }

    #[test]
    fn predict_proba_sums_to_one() {
        let features = vec![
            vec![1.0],
            vec![2.0],
            vec![3.0],
            vec![10.0],
            vec![11.0],
            vec![12.0],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let tree = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        let proba = tree.predict_proba(&[5.0]).unwrap();
        let sum: f64 = proba.iter().sum();
        assert!((sum - 1.0).abs() < 1e-10);
    }

    #[test]
    fn deterministic_with_same_seed() {
        let features = vec![
            vec![1.0, 5.0],
            vec![2.0, 6.0],
            vec![3.0, 7.0],
            vec![10.0, 15.0],
            vec![11.0, 16.0],
            vec![12.0, 17.0],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let tree1 = DecisionTreeConfig::new()
            .with_seed(123)
            .fit(&features, &labels)
            .unwrap();
        let tree2 = DecisionTreeConfig::new()
            .with_seed(123)
            .fit(&features, &labels)
            .unwrap();
        for sample in &features {
            assert_eq!(tree1.predict(sample).unwrap(), tree2.predict(sample).unwrap());
        }
    }

    #[test]
    fn max_depth_limits_tree() {
        // XOR needs depth 2; capped at 1 the tree cannot be perfect.
        let features = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];
        let labels = vec![0, 1, 1, 0];
        let tree = DecisionTreeConfig::new()
            .with_max_depth(Some(1))
            .with_seed(42)
            .fit(&features, &labels)
            .unwrap();
        assert!(tree.n_nodes() <= 3);
    }

    #[test]
    fn prediction_feature_mismatch() {
        let features = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let labels = vec![0, 1];
        let tree = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        let err = tree.predict(&[1.0]).unwrap_err();
        assert!(matches!(
            err,
            RfError::PredictionFeatureMismatch { expected: 2, got: 1 }
        ));
    }

    #[test]
    fn feature_count_mismatch_error() {
        let features = vec![vec![1.0, 2.0], vec![3.0]];
        let labels = vec![0, 1];
        let err = DecisionTreeConfig::new().fit(&features, &labels).unwrap_err();
        assert!(matches!(err, RfError::FeatureCountMismatch { .. }));
    }
}
