//! Dataset preparation: robust scaling, holdout splitting, and
//! minority-class oversampling.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::IoError;
use crate::domain::{Dataset, Split};

/// Interpolated quantile of pre-sorted values, `q` in [0, 1].
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Scale every feature column in place to `(x - median) / IQR`.
///
/// Columns with zero interquartile range keep their median-centered
/// values unscaled (the divisor becomes 1.0), so constant columns
/// collapse to zero instead of NaN.
pub fn robust_scale(dataset: &mut Dataset) {
    let n_samples = dataset.n_samples();
    let n_features = dataset.n_features();
    if n_samples == 0 {
        return;
    }

    for col in 0..n_features {
        let mut values: Vec<f64> = dataset.features().iter().map(|row| row[col]).collect();
        values.sort_unstable_by(f64::total_cmp);

        let median = quantile_sorted(&values, 0.5);
        let iqr = quantile_sorted(&values, 0.75) - quantile_sorted(&values, 0.25);
        let scale = if iqr == 0.0 { 1.0 } else { iqr };

        for row in dataset.features_mut().iter_mut() {
            row[col] = (row[col] - median) / scale;
        }
    }
}

/// Randomly partition a dataset into train and test splits.
///
/// The test split receives `(n * test_fraction)` rows, rounded, clamped
/// so both partitions are non-empty.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::InvalidTestFraction`] | `test_fraction` outside (0.0, 1.0) |
/// | [`IoError::TooFewRows`] | Fewer than 2 samples |
pub fn train_test_split(
    dataset: &Dataset,
    test_fraction: f64,
    rng: &mut impl Rng,
) -> Result<Split, IoError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(IoError::InvalidTestFraction {
            fraction: test_fraction,
        });
    }
    let n = dataset.n_samples();
    if n < 2 {
        return Err(IoError::TooFewRows { n_rows: n });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    let n_test = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);
    let (test_indices, train_indices) = indices.split_at(n_test);

    debug!(
        n_train = train_indices.len(),
        n_test = test_indices.len(),
        "split dataset"
    );

    Ok(Split {
        train: dataset.subset(train_indices),
        test: dataset.subset(test_indices),
    })
}

/// Random oversampling: duplicate minority-class rows (with replacement)
/// until every present class matches the majority count.
///
/// Row order is original rows first, then the duplicated rows.
#[must_use]
pub fn oversample(dataset: &Dataset, rng: &mut impl Rng) -> Dataset {
    let counts = dataset.class_counts();
    let Some(&majority) = counts.values().max() else {
        return dataset.clone();
    };

    let labels = dataset.labels_as_indices();
    let mut keep: Vec<usize> = (0..dataset.n_samples()).collect();
    for (&class, &count) in &counts {
        if count == majority {
            continue;
        }
        let class_rows: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        for _ in 0..(majority - count) {
            let pick = class_rows[rng.gen_range(0..class_rows.len())];
            keep.push(pick);
        }
    }

    debug!(
        n_before = dataset.n_samples(),
        n_after = keep.len(),
        "oversampled minority classes"
    );
    dataset.subset(&keep)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::domain::{CellLine, GeneId, Label};

    fn make_dataset(labels: Vec<Label>, features: Vec<Vec<f64>>) -> Dataset {
        let n = labels.len();
        let n_features = features.first().map_or(0, Vec::len);
        Dataset::new(
            (0..n).map(|i| GeneId::new(format!("G{i}"))).collect(),
            (0..n).map(|i| CellLine::new(format!("C{}", i % 2))).collect(),
            (0..n_features).map(|j| format!("f{j}")).collect(),
            features,
            labels,
        )
        .unwrap()
    }

    #[test]
    fn robust_scale_centers_on_median() {
        let mut ds = make_dataset(
            vec![Label::Up, Label::Neutral, Label::Down, Label::Up, Label::Down],
            vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0], vec![5.0]],
        );
        robust_scale(&mut ds);
        // Median 3.0, IQR = 4.0 - 2.0 = 2.0.
        assert!((ds.features()[2][0] - 0.0).abs() < 1e-12);
        assert!((ds.features()[0][0] - (-1.0)).abs() < 1e-12);
        assert!((ds.features()[4][0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn robust_scale_constant_column_goes_to_zero() {
        let mut ds = make_dataset(
            vec![Label::Up, Label::Down, Label::Up],
            vec![vec![7.0], vec![7.0], vec![7.0]],
        );
        robust_scale(&mut ds);
        for row in ds.features() {
            assert_eq!(row[0], 0.0);
        }
    }

    #[test]
    fn split_sizes_and_disjointness() {
        let n = 100;
        let ds = make_dataset(
            (0..n)
                .map(|i| Label::from_class_index(i % 3).unwrap())
                .collect(),
            (0..n).map(|i| vec![i as f64]).collect(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let split = train_test_split(&ds, 0.3, &mut rng).unwrap();
        assert_eq!(split.test.n_samples(), 30);
        assert_eq!(split.train.n_samples(), 70);

        let mut seen: Vec<f64> = split
            .train
            .features()
            .iter()
            .chain(split.test.features())
            .map(|row| row[0])
            .collect();
        seen.sort_unstable_by(f64::total_cmp);
        seen.dedup();
        assert_eq!(seen.len(), n);
    }

    #[test]
    fn split_rejects_bad_fraction() {
        let ds = make_dataset(
            vec![Label::Up, Label::Down],
            vec![vec![1.0], vec![2.0]],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!(matches!(
            train_test_split(&ds, 0.0, &mut rng),
            Err(IoError::InvalidTestFraction { .. })
        ));
        assert!(matches!(
            train_test_split(&ds, 1.0, &mut rng),
            Err(IoError::InvalidTestFraction { .. })
        ));
    }

    #[test]
    fn split_rejects_single_row() {
        let ds = make_dataset(vec![Label::Up], vec![vec![1.0]]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!(matches!(
            train_test_split(&ds, 0.3, &mut rng),
            Err(IoError::TooFewRows { n_rows: 1 })
        ));
    }

    #[test]
    fn oversample_balances_classes() {
        let ds = make_dataset(
            vec![
                Label::Up,
                Label::Up,
                Label::Up,
                Label::Up,
                Label::Neutral,
                Label::Neutral,
                Label::Down,
            ],
            (0..7).map(|i| vec![i as f64]).collect(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let balanced = oversample(&ds, &mut rng);
        let counts = balanced.class_counts();
        assert_eq!(counts[&0], 4);
        assert_eq!(counts[&1], 4);
        assert_eq!(counts[&2], 4);
        assert_eq!(balanced.n_samples(), 12);
    }

    #[test]
    fn oversample_already_balanced_is_identity() {
        let ds = make_dataset(
            vec![Label::Up, Label::Neutral, Label::Down],
            (0..3).map(|i| vec![i as f64]).collect(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let out = oversample(&ds, &mut rng);
        assert_eq!(out.n_samples(), 3);
    }
}
