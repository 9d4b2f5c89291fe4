use rand::Rng;

use crate::node::FeatureIndex;

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Compute the impurity of a node from its class counts.
    ///
    /// Returns 0.0 when `n_samples` is zero (pure node).
    #[must_use]
    pub fn impurity(&self, class_counts: &[usize], n_samples: usize) -> f64 {
        if n_samples == 0 {
            return 0.0;
        }
        let n = n_samples as f64;
        match self {
            SplitCriterion::Gini => {
                let sum_sq: f64 = class_counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p
                    })
                    .sum();
                1.0 - sum_sq
            }
            SplitCriterion::Entropy => -class_counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        }
    }
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Find the best split among a random subset of features.
///
/// For each of `max_features` randomly chosen features, sorts the
/// `(value, label)` pairs, scans left-to-right with incremental class
/// count updates, and tracks the globally best split by weighted
/// impurity decrease.
///
/// `features` is column-major: `features[feature_idx][sample_idx]`.
/// Returns `None` when no valid split exists (all values identical,
/// or every boundary would violate `min_samples_leaf`).
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_best_split(
    features: &[Vec<f64>],
    labels: &[usize],
    sample_indices: &[usize],
    n_classes: usize,
    criterion: SplitCriterion,
    max_features: usize,
    min_samples_leaf: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_features = features.len();
    let n_samples = sample_indices.len();
    if n_samples < 2 || n_features == 0 {
        return None;
    }

    let mut parent_counts = vec![0usize; n_classes];
    for &si in sample_indices {
        parent_counts[labels[si]] += 1;
    }
    let parent_impurity = criterion.impurity(&parent_counts, n_samples);

    // Partial Fisher-Yates: shuffle only the first `max_features` positions.
    let mut feature_order: Vec<usize> = (0..n_features).collect();
    let take = max_features.min(n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        feature_order.swap(i, j);
    }

    let mut best_decrease = f64::NEG_INFINITY;
    let mut best: Option<(FeatureIndex, f64)> = None;

    for &feat_idx in &feature_order[..take] {
        let feat_col = &features[feat_idx];

        let mut sorted: Vec<(f64, usize)> = sample_indices
            .iter()
            .map(|&si| (feat_col[si], si))
            .collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        // Incremental scan: left grows from empty, right shrinks from full.
        let mut left_counts = vec![0usize; n_classes];
        let mut right_counts = parent_counts.clone();

        for i in 0..(n_samples - 1) {
            let (val_i, si) = sorted[i];
            let class_i = labels[si];
            left_counts[class_i] += 1;
            right_counts[class_i] -= 1;

            // No valid boundary between identical values.
            if val_i == sorted[i + 1].0 {
                continue;
            }

            let n_left = i + 1;
            let n_right = n_samples - n_left;
            if n_left < min_samples_leaf || n_right < min_samples_leaf {
                continue;
            }

            let decrease = (n_samples as f64) * parent_impurity
                - (n_left as f64) * criterion.impurity(&left_counts, n_left)
                - (n_right as f64) * criterion.impurity(&right_counts, n_right);

            if decrease > best_decrease {
                best_decrease = decrease;
                let threshold = (val_i + sorted[i + 1].0) / 2.0;
                best = Some((FeatureIndex::new(feat_idx), threshold));
            }
        }
    }

    let (feature, threshold) = best?;

    let feat_col = &features[feature.index()];
    let mut left_indices = Vec::with_capacity(n_samples / 2);
    let mut right_indices = Vec::with_capacity(n_samples / 2);
    for &si in sample_indices {
        if feat_col[si] <= threshold {
            left_indices.push(si);
        } else {
            right_indices.push(si);
        }
    }

    Some(SplitResult {
        feature,
        threshold,
        left_indices,
        right_indices,
    })
}
