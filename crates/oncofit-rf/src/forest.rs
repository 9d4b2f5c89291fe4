//! Random Forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::error::RfError;
use crate::oob::{OobScore, compute_oob};
use crate::split::SplitCriterion;
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// Strategy for determining the number of features considered per split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFeatures {
    /// Square root of total features (the bagging default).
    Sqrt,
    /// A fixed count.
    Fixed(usize),
    /// All features (no subsampling).
    All,
}

/// Resolve [`MaxFeatures`] to a concrete count.
pub(crate) fn resolve_max_features(
    max_features: MaxFeatures,
    n_features: usize,
) -> Result<usize, RfError> {
    let resolved = match max_features {
        MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
        MaxFeatures::Fixed(n) => n,
        MaxFeatures::All => n_features,
    };
    if resolved == 0 || resolved > n_features {
        return Err(RfError::InvalidMaxFeatures {
            max_features: resolved,
            n_features,
        });
    }
    Ok(resolved)
}

/// Configuration for Random Forest training.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) seed: u64,
    pub(crate) bootstrap_fraction: f64,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Gini,
            seed: 42,
            bootstrap_fraction: 1.0,
        })
    }

    /// Set the max features strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
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

    /// Set the minimum number of samples required in each leaf.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the bootstrap fraction (proportion of samples drawn per tree).
    #[must_use]
    pub fn with_bootstrap_fraction(mut self, bootstrap_fraction: f64) -> Self {
        self.bootstrap_fraction = bootstrap_fraction;
        self
    }

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a Random Forest on the provided dataset.
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
    /// | [`RfError::NonFiniteValue`] | any value is NaN or infinite |
    /// | [`RfError::InvalidMaxFeatures`] | resolved max_features outside [1, n_features] |
    /// | [`RfError::InvalidBootstrapFraction`] | bootstrap_fraction outside (0.0, 1.0] |
    /// | [`RfError::OobEvaluationFailed`] | no sample has any OOB tree |
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<RandomForest, RfError> {
        train(self, features, labels)
    }
}

/// A fitted Random Forest ensemble with its out-of-bag score.
#[derive(Debug, Clone)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
    pub(crate) oob: OobScore,
}

impl RandomForest {
    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the number of feature columns the forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of distinct classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Return the out-of-bag score computed at training time.
    #[must_use]
    pub fn oob_score(&self) -> &OobScore {
        &self.oob
    }

    /// Predict the class label for a single sample by majority vote.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] on shape mismatch.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, RfError> {
        let proba = self.predict_proba(sample)?;
        Ok(argmax(&proba))
    }

    /// Return the mean class probability distribution across trees.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] on shape mismatch.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<Vec<f64>, RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut acc = vec![0.0f64; self.n_classes];
        for tree in &self.trees {
            let dist = tree.predict_proba(sample)?;
            for (a, d) in acc.iter_mut().zip(dist.iter()) {
                *a += d;
            }
        }
        let n = self.trees.len() as f64;
        acc.iter_mut().for_each(|v| *v /= n);
        Ok(acc)
    }

    /// Predict class labels for a batch of samples.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] on shape mismatch.
    pub fn predict_batch(&self, samples: &[Vec<f64>]) -> Result<Vec<usize>, RfError> {
        samples.iter().map(|s| self.predict(s)).collect()
    }

    /// Return mean class probability distributions for a batch of samples.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] on shape mismatch.
    pub fn predict_proba_batch(&self, samples: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, RfError> {
        samples.iter().map(|s| self.predict_proba(s)).collect()
    }

    /// Fraction of `samples` whose prediction matches `labels`.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] on shape mismatch.
    pub fn score(&self, samples: &[Vec<f64>], labels: &[usize]) -> Result<f64, RfError> {
        if samples.is_empty() {
            return Ok(0.0);
        }
        let predictions = self.predict_batch(samples)?;
        let correct = predictions
            .iter()
            .zip(labels)
            .filter(|&(&p, &l)| p == l)
            .count();
        Ok(correct as f64 / labels.len() as f64)
    }
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

/// Generate a bootstrap sample and the out-of-bag indices.
fn bootstrap_sample(
    n_samples: usize,
    draw_count: usize,
    rng: &mut impl Rng,
) -> (Vec<usize>, Vec<usize>) {
    let mut in_bag = vec![false; n_samples];
    let mut bootstrap_indices = Vec::with_capacity(draw_count);
    for _ in 0..draw_count {
        let idx = rng.gen_range(0..n_samples);
        bootstrap_indices.push(idx);
        in_bag[idx] = true;
    }
    let oob_indices: Vec<usize> = (0..n_samples).filter(|&i| !in_bag[i]).collect();
    (bootstrap_indices, oob_indices)
}

/// Train the Random Forest ensemble.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[usize],
) -> Result<RandomForest, RfError> {
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
        for (feature_index, &val) in row.iter().enumerate() {
            if !val.is_finite() {
                return Err(RfError::NonFiniteValue {
                    sample_index,
                    feature_index,
                });
            }
        }
    }

    let max_features_resolved = resolve_max_features(config.max_features, n_features)?;
    if config.bootstrap_fraction <= 0.0 || config.bootstrap_fraction > 1.0 {
        return Err(RfError::InvalidBootstrapFraction {
            fraction: config.bootstrap_fraction,
        });
    }

    let n_classes = labels.iter().max().copied().unwrap_or(0) + 1;
    let draw_count = ((n_samples as f64) * config.bootstrap_fraction).ceil() as usize;

    debug!(
        n_samples,
        n_features,
        n_classes,
        max_features = max_features_resolved,
        draw_count,
        "training random forest"
    );

    // Per-tree seeds derived from the master RNG.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let criterion = config.criterion;
    let max_depth = config.max_depth;
    let min_samples_split = config.min_samples_split;
    let min_samples_leaf = config.min_samples_leaf;

    let tree_results: Vec<(DecisionTree, Vec<usize>)> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (bootstrap_indices, oob_indices) = bootstrap_sample(n_samples, draw_count, &mut rng);

            let boot_features: Vec<Vec<f64>> = bootstrap_indices
                .iter()
                .map(|&i| features[i].clone())
                .collect();
            let boot_labels: Vec<usize> = bootstrap_indices.iter().map(|&i| labels[i]).collect();

            let tree_config = DecisionTreeConfig::new()
                .with_criterion(criterion)
                .with_max_depth(max_depth)
                .with_min_samples_split(min_samples_split)
                .with_min_samples_leaf(min_samples_leaf)
                .with_max_features(Some(max_features_resolved))
                .with_seed(rng.r#gen());

            // All inputs are pre-validated, so fit cannot fail on data errors.
            let tree = tree_config
                .fit(&boot_features, &boot_labels)
                .expect("tree fit should not fail on pre-validated data");

            (tree, oob_indices)
        })
        .collect();

    let mut trees = Vec::with_capacity(config.n_trees);
    let mut oob_indices_per_tree = Vec::with_capacity(config.n_trees);
    for (tree, oob) in tree_results {
        trees.push(tree);
        oob_indices_per_tree.push(oob);
    }

    let oob = compute_oob(&trees, features, labels, n_classes, &oob_indices_per_tree)?;

    info!(
        n_trees_trained = trees.len(),
        oob_accuracy = oob.accuracy,
        "random forest training complete"
    );

    Ok(RandomForest {
        trees,
        n_features,
        n_classes,
        oob,
    })
}

#[cfg(test)]
mod tests {
    use super::{MaxFeatures, RandomForestConfig};

    /// Generate a simple 3-class separable dataset.
    fn make_separable_data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            features.push(vec![i as f64 * 0.15, 0.5]);
            labels.push(0);
        }
        for i in 0..20 {
            features.push(vec![10.0 + i as f64 * 0.15, 0.5]);
            labels.push(1);
        }
        for i in 0..20 {
            features.push(vec![20.0 + i as f64 * 0.15, 0.5]);
            labels.push(2);
        }
        (features, labels)
    }

    #[test]
    fn three_class_separable_accuracy() {
        let (features, labels) = make_separable_data();
        let forest = RandomForestConfig::new(50)
            .unwrap()
            .with_max_features(MaxFeatures::All)
            .with_seed(42)
            .fit(&features, &labels)
            .unwrap();

        let accuracy = forest.score(&features, &labels).unwrap();
        assert!(accuracy > 0.9, "accuracy = {accuracy}");
    }

    #[test]
    fn oob_score_computed() {
        let (features, labels) = make_separable_data();
        let forest = RandomForestConfig::new(50)
            .unwrap()
            .with_seed(42)
            .fit(&features, &labels)
            .unwrap();

        let oob = forest.oob_score();
        assert!(oob.accuracy > 0.8, "oob accuracy = {}", oob.accuracy);
        assert!(oob.n_oob_samples > 0);
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (features, labels) = make_separable_data();
        let forest1 = RandomForestConfig::new(10)
            .unwrap()
            .with_seed(99)
            .fit(&features, &labels)
            .unwrap();
        let forest2 = RandomForestConfig::new(10)
            .unwrap()
            .with_seed(99)
            .fit(&features, &labels)
            .unwrap();

        assert_eq!(
            forest1.predict_batch(&features).unwrap(),
            forest2.predict_batch(&features).unwrap()
        );
    }

    #[test]
    fn predict_proba_batch_matches_individual() {
        let (features, labels) = make_separable_data();
        let forest = RandomForestConfig::new(10)
            .unwrap()
            .with_seed(42)
            .fit(&features, &labels)
            .unwrap();

        let batch = forest.predict_proba_batch(&features).unwrap();
        for (i, sample) in features.iter().enumerate() {
            let single = forest.predict_proba(sample).unwrap();
            assert_eq!(batch[i], single);
        }
    }

    #[test]
    fn invalid_tree_count_error() {
        assert!(RandomForestConfig::new(0).is_err());
    }

    #[test]
    fn empty_dataset_error() {
        let config = RandomForestConfig::new(10).unwrap();
        let err = config.fit(&[], &[]).unwrap_err();
        assert!(matches!(err, crate::RfError::EmptyDataset));
    }

    #[test]
    fn fixed_max_features_too_large_error() {
        let (features, labels) = make_separable_data();
        let err = RandomForestConfig::new(5)
            .unwrap()
            .with_max_features(MaxFeatures::Fixed(10))
            .fit(&features, &labels)
            .unwrap_err();
        assert!(matches!(err, crate::RfError::InvalidMaxFeatures { .. }));
    }

    #[test]
    fn non_finite_value_error() {
        let features = vec![vec![1.0, f64::NAN], vec![3.0, 4.0]];
        let labels = vec![0, 1];
        let err = RandomForestConfig::new(5)
            .unwrap()
            .fit(&features, &labels)
            .unwrap_err();
        assert!(matches!(err, crate::RfError::NonFiniteValue { .. }));
    }
}
