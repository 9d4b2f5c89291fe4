use std::fmt;

/// Zero-based feature column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based feature column index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a `Vec<Node>` arena, identifying a node in a decision tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A node in a decision tree arena.
///
/// Trees are stored as `Vec<Node>` where children are referenced by
/// [`NodeIndex`] rather than pointers.
#[derive(Debug, Clone)]
pub enum Node {
    /// An interior split node.
    Split {
        /// Feature used for the split.
        feature: FeatureIndex,
        /// Threshold value: samples with feature <= threshold go left.
        threshold: f64,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
    },
    /// A terminal leaf node.
    Leaf {
        /// Predicted class (argmax of distribution).
        prediction: usize,
        /// Normalized class probability distribution.
        distribution: Vec<f64>,
        /// Number of training samples in this leaf.
        n_samples: usize,
    },
}

impl Node {
    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::{FeatureIndex, Node, NodeIndex};

    #[test]
    fn feature_index_roundtrip() {
        let fi = FeatureIndex::new(7);
        assert_eq!(fi.index(), 7);
    }

    #[test]
    fn node_index_ordering() {
        assert!(NodeIndex::new(10) < NodeIndex::new(20));
    }

    #[test]
    fn leaf_is_leaf() {
        let leaf = Node::Leaf {
            prediction: 1,
            distribution: vec![0.2, 0.8],
            n_samples: 10,
        };
        assert!(leaf.is_leaf());
    }

    #[test]
    fn split_is_not_leaf() {
        let split = Node::Split {
            feature: FeatureIndex::new(2),
            threshold: 3.5,
            left: NodeIndex::new(1),
            right: NodeIndex::new(2),
        };
        assert!(!split.is_leaf());
    }
}
