//! Accuracy regression tests for oncofit-rf.
//!
//! These tests verify that algorithmic changes do not degrade ensemble
//! classification accuracy on a deterministic synthetic dataset.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use oncofit_rf::{
    CrossValidation, EnsembleTrainer, GrowthSchedule, MaxFeatures, RandomForestConfig,
};

// ---------------------------------------------------------------------------
// Helper: deterministic synthetic classification dataset
// ---------------------------------------------------------------------------

/// Generate a 300-sample, 10-feature, 3-class classification dataset.
///
/// Features 0-2 are informative (class * 3.0 + noise in [0, 0.5]).
/// Features 3-9 are pure noise in [0, 0.5].
/// Samples are assigned round-robin across classes.
fn make_classification() -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let n_samples = 300;
    let n_features = 10;
    let n_classes = 3;

    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let class = i % n_classes;
        labels.push(class);
        let row: Vec<f64> = (0..n_features)
            .map(|f| {
                let base = if f < 3 { class as f64 * 3.0 } else { 0.0 };
                base + rng.r#gen::<f64>() * 0.5
            })
            .collect();
        features.push(row);
    }
    (features, labels)
}

// ---------------------------------------------------------------------------
// a) cv_accuracy_above_threshold
// ---------------------------------------------------------------------------

/// 5-fold cross-validation mean accuracy must exceed 0.85 on the
/// synthetic dataset.
///
/// Reference: observed mean_accuracy = 1.0 with seed=42, 100 trees.
#[test]
fn cv_accuracy_above_threshold() {
    let (features, labels) = make_classification();
    let config = RandomForestConfig::new(100).unwrap().with_seed(42);
    let cv = CrossValidation::new(5).unwrap().with_seed(42);
    let result = cv.evaluate(&config, &features, &labels).unwrap();

    assert!(
        result.mean_accuracy > 0.85,
        "cv mean_accuracy {} <= 0.85",
        result.mean_accuracy
    );
}

// ---------------------------------------------------------------------------
// b) oob_accuracy_above_threshold
// ---------------------------------------------------------------------------

/// OOB accuracy with 100 trees must exceed 0.80.
///
/// Reference: observed oob_accuracy = 1.0 with seed=42, 100 trees.
#[test]
fn oob_accuracy_above_threshold() {
    let (features, labels) = make_classification();
    let forest = RandomForestConfig::new(100)
        .unwrap()
        .with_seed(42)
        .fit(&features, &labels)
        .unwrap();

    assert!(
        forest.oob_score().accuracy > 0.8,
        "oob accuracy {} <= 0.8",
        forest.oob_score().accuracy
    );
}

// ---------------------------------------------------------------------------
// c) holdout_accuracy_above_threshold
// ---------------------------------------------------------------------------

/// Fitting on two thirds of the data and scoring the rest must exceed
/// 0.85 accuracy. Round-robin ordering keeps both partitions balanced.
#[test]
fn holdout_accuracy_above_threshold() {
    let (features, labels) = make_classification();
    let forest = RandomForestConfig::new(100)
        .unwrap()
        .with_max_features(MaxFeatures::Sqrt)
        .with_seed(42)
        .fit(&features[..200], &labels[..200])
        .unwrap();

    let accuracy = forest.score(&features[200..], &labels[200..]).unwrap();
    assert!(accuracy > 0.85, "holdout accuracy {accuracy} <= 0.85");
}

// ---------------------------------------------------------------------------
// d) seeded reproducibility
// ---------------------------------------------------------------------------

/// Two forests grown from the same seed must agree on every prediction.
#[test]
fn same_seed_same_predictions() {
    let (features, labels) = make_classification();
    let config = RandomForestConfig::new(50).unwrap().with_seed(7);

    let a = config.fit(&features, &labels).unwrap();
    let b = config.fit(&features, &labels).unwrap();

    assert_eq!(
        a.predict_batch(&features).unwrap(),
        b.predict_batch(&features).unwrap()
    );
    assert_eq!(a.oob_score().accuracy, b.oob_score().accuracy);
}

// ---------------------------------------------------------------------------
// e) trainer growth schedule
// ---------------------------------------------------------------------------

/// The ensemble trainer must keep the final schedule step's forest and
/// report holdout metrics in range.
#[test]
fn trainer_keeps_final_schedule_step() {
    let (features, labels) = make_classification();
    let outcome = EnsembleTrainer::new()
        .with_schedule(GrowthSchedule::new(20, 60, 20).unwrap())
        .with_cv_folds(3)
        .with_seed(42)
        .train(&features[..200], &labels[..200], &features[200..], &labels[200..])
        .unwrap();

    assert_eq!(outcome.forest.n_trees(), 60);
    assert_eq!(outcome.predictions.len(), 100);
    assert!(outcome.oob_accuracy > 0.8);
    assert!(outcome.cv_accuracy > 0.8);
}
