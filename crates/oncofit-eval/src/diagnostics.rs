//! Post-hoc diagnostics: ordinal gradient correlation and one-vs-rest AUROC.

use oncofit_io::{Dataset, Label, Target, robust_scale, train_test_split};
use oncofit_rf::{MaxFeatures, RandomForestConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument};

use crate::error::EvalError;

/// Pearson correlation. Returns NaN when either series is constant.
fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    cov / (var_x * var_y).sqrt()
}

/// Median of values via sorted interpolation. 0.0 for an empty slice.
fn median(values: &mut Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(f64::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Per-feature correlation against the ordinal class gradient.
#[derive(Debug, Clone)]
pub struct FeatureCorrelation {
    /// Feature column name.
    pub feature: String,
    /// Pearson correlation of per-class medians vs [+1, 0, -1].
    pub correlation: f64,
}

/// For each feature, correlate its per-class medians against the
/// ordinal gradient `[+1, 0, -1]` (up, neutral, down).
///
/// A feature whose medians rise with upregulation scores near +1, one
/// that falls scores near -1. Undefined correlations (constant medians,
/// or a class absent from the data) are reported as 0.0.
#[instrument(skip_all, fields(n_features = dataset.n_features()))]
#[must_use]
pub fn class_median_correlation(dataset: &Dataset) -> Vec<FeatureCorrelation> {
    let labels = dataset.labels();
    let gradient: Vec<f64> = Label::ALL.iter().map(Label::ordinal).collect();

    dataset
        .feature_names()
        .iter()
        .enumerate()
        .map(|(col, name)| {
            let medians: Vec<f64> = Label::ALL
                .iter()
                .map(|&label| {
                    let mut values: Vec<f64> = dataset
                        .features()
                        .iter()
                        .zip(labels)
                        .filter(|&(_, &l)| l == label)
                        .map(|(row, _)| row[col])
                        .collect();
                    median(&mut values)
                })
                .collect();

            let r = pearson(&medians, &gradient);
            FeatureCorrelation {
                feature: name.clone(),
                // Undefined correlation maps to no-signal.
                correlation: if r.is_nan() { 0.0 } else { r },
            }
        })
        .collect()
}

/// Micro-averaged and per-class one-vs-rest AUROC for one run.
#[derive(Debug, Clone)]
pub struct AurocSummary {
    /// Cancer context.
    pub cancer: String,
    /// Target column display name.
    pub target: String,
    /// Micro-averaged AUROC over all (sample, class) pairs.
    pub auroc: f64,
    /// Per-class AUROC in class-index order; NaN when the class is
    /// absent from the holdout.
    pub per_class: [f64; 3],
}

/// Area under the ROC curve from scores and binary relevance.
///
/// Returns NaN when the positives or negatives are empty.
fn roc_auc(scores: &[f64], positives: &[bool]) -> f64 {
    let n_pos = positives.iter().filter(|&&p| p).count();
    let n_neg = positives.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return f64::NAN;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_unstable_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut auc = 0.0;
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut prev_tp = 0usize;
    let mut prev_fp = 0usize;
    let mut i = 0;
    while i < order.len() {
        // Advance through ties as one threshold step.
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]] == threshold {
            if positives[order[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        auc += (fp - prev_fp) as f64 * (tp + prev_tp) as f64 / 2.0;
        prev_tp = tp;
        prev_fp = fp;
    }
    auc / (n_pos as f64 * n_neg as f64)
}

/// Fit a forest on a seeded split and measure one-vs-rest AUROC from
/// its class probabilities on the holdout.
///
/// The same seed always yields the same split, the same forest, and
/// therefore the same summary.
///
/// # Errors
///
/// Forwards dataset splitting and forest training errors.
#[instrument(skip_all, fields(cancer, target = %target))]
pub fn compute_auroc(
    dataset: &Dataset,
    target: &Target,
    cancer: &str,
    seed: u64,
) -> Result<AurocSummary, EvalError> {
    let mut scaled = dataset.clone();
    robust_scale(&mut scaled);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let split = train_test_split(&scaled, 0.3, &mut rng)?;

    let forest = RandomForestConfig::new(128)?
        .with_max_features(MaxFeatures::Sqrt)
        .with_seed(seed)
        .fit(split.train.features(), &split.train.labels_as_indices())?;

    let probabilities = forest.predict_proba_batch(split.test.features())?;
    let test_labels = split.test.labels_as_indices();

    let mut micro_scores = Vec::new();
    let mut micro_positives = Vec::new();
    let mut per_class = [f64::NAN; 3];

    for label in Label::ALL {
        let class = label.class_index();
        // A class absent from training shrinks the probability vector;
        // its score is zero everywhere.
        let scores: Vec<f64> = probabilities
            .iter()
            .map(|p| p.get(class).copied().unwrap_or(0.0))
            .collect();
        let positives: Vec<bool> = test_labels.iter().map(|&l| l == class).collect();

        per_class[class] = roc_auc(&scores, &positives);
        micro_scores.extend_from_slice(&scores);
        micro_positives.extend_from_slice(&positives);
    }

    let auroc = roc_auc(&micro_scores, &micro_positives);
    info!(auroc, "AUROC computed");

    Ok(AurocSummary {
        cancer: cancer.to_string(),
        target: target.column().to_string(),
        auroc,
        per_class,
    })
}

#[cfg(test)]
mod tests {
    use oncofit_io::{CellLine, GeneId};

    use super::*;

    fn make_dataset(n_per_class: usize) -> Dataset {
        let mut gene_ids = Vec::new();
        let mut cell_lines = Vec::new();
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for (class, label) in Label::ALL.into_iter().enumerate() {
            let offset = class as f64 * 10.0;
            for i in 0..n_per_class {
                gene_ids.push(GeneId::new(format!("G{class}_{i}")));
                cell_lines.push(CellLine::new("C0"));
                features.push(vec![offset + i as f64 * 0.1, 0.5]);
                labels.push(label);
            }
        }
        Dataset::new(
            gene_ids,
            cell_lines,
            vec!["x".to_string(), "y".to_string()],
            features,
            labels,
        )
        .unwrap()
    }

    #[test]
    fn pearson_perfect_positive() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_constant_is_nan() {
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 0.0, -1.0]).is_nan());
    }

    #[test]
    fn gradient_correlation_signs() {
        // Feature x grows with class index (Up lowest, Down highest),
        // so its medians run [low, mid, high] against the gradient
        // [+1, 0, -1] and correlate at exactly -1.
        let dataset = make_dataset(10);
        let correlations = class_median_correlation(&dataset);
        assert_eq!(correlations.len(), 2);
        assert_eq!(correlations[0].feature, "x");
        assert!((correlations[0].correlation + 1.0).abs() < 1e-9);
        // Constant feature y has no signal.
        assert_eq!(correlations[1].correlation, 0.0);
    }

    #[test]
    fn gradient_correlation_absent_class_is_defined() {
        // Only Up and Down present; the Neutral median falls back to 0,
        // which still yields a finite correlation.
        let dataset = make_dataset(10);
        let kept: Vec<usize> = (0..dataset.n_samples())
            .filter(|&i| dataset.labels()[i] != Label::Neutral)
            .collect();
        let correlations = class_median_correlation(&dataset.subset(&kept));
        assert!(correlations[0].correlation.is_finite());
    }

    #[test]
    fn roc_auc_perfect_ranking() {
        let scores = [0.9, 0.8, 0.3, 0.1];
        let positives = [true, true, false, false];
        assert!((roc_auc(&scores, &positives) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn roc_auc_random_ties() {
        // All scores tied: AUC is exactly 0.5.
        let scores = [0.5, 0.5, 0.5, 0.5];
        let positives = [true, false, true, false];
        assert!((roc_auc(&scores, &positives) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn roc_auc_single_class_is_nan() {
        assert!(roc_auc(&[0.5, 0.6], &[true, true]).is_nan());
    }

    #[test]
    fn auroc_separable_data_near_one() {
        let dataset = make_dataset(20);
        let summary = compute_auroc(&dataset, &Target::new("CNV"), "breast", 42).unwrap();
        assert!(summary.auroc > 0.9, "auroc = {}", summary.auroc);
        for class_auroc in summary.per_class {
            assert!(class_auroc > 0.9, "per-class auroc = {class_auroc}");
        }
    }

    #[test]
    fn auroc_idempotent_for_same_seed() {
        let dataset = make_dataset(15);
        let target = Target::new("TCGA_annot");
        let a = compute_auroc(&dataset, &target, "lung", 7).unwrap();
        let b = compute_auroc(&dataset, &target, "lung", 7).unwrap();
        assert_eq!(a.auroc, b.auroc);
        assert_eq!(a.per_class, b.per_class);
    }

    #[test]
    fn auroc_absent_class_is_nan() {
        // Drop every Down sample; its one-vs-rest AUROC is undefined.
        let dataset = make_dataset(20);
        let kept: Vec<usize> = (0..dataset.n_samples())
            .filter(|&i| dataset.labels()[i] != Label::Down)
            .collect();
        let reduced = dataset.subset(&kept);
        let summary = compute_auroc(&reduced, &Target::new("CNV"), "breast", 42).unwrap();
        assert!(summary.per_class[Label::Down.class_index()].is_nan());
        assert!(summary.auroc.is_finite());
    }
}
