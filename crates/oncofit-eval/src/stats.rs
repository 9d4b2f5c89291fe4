//! Summary statistics over trial series, with a one-sample t-test.

use oncofit_io::Target;

use crate::metrics::TrialMetrics;

/// Two-tailed p-values are clamped here to keep downstream CSV
/// consumers away from literal zeros.
pub const P_VALUE_FLOOR: f64 = 1e-50;

/// Arithmetic mean. Returns 0.0 for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof = 1). Returns 0.0 for fewer than two values.
#[must_use]
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

/// One-sample two-tailed t-test of `values` against the hypothesized
/// mean `mu`.
///
/// Returns `(t_statistic, p_value)`. Degenerate series (fewer than two
/// values, or zero variance) yield `(0.0, 1.0)`. The p-value is clamped
/// to `[P_VALUE_FLOOR, 1.0]`.
#[must_use]
pub fn one_sample_t_test(values: &[f64], mu: f64) -> (f64, f64) {
    let n = values.len();
    let s = sample_std(values);
    if n < 2 || s == 0.0 {
        return (0.0, 1.0);
    }
    let t = (mean(values) - mu) / (s / (n as f64).sqrt());
    let df = (n - 1) as f64;
    let p = 2.0 * (1.0 - t_distribution_cdf(t.abs(), df));
    (t, p.clamp(P_VALUE_FLOOR, 1.0))
}

/// CDF of Student's t-distribution with `df` degrees of freedom.
///
/// Uses the regularized incomplete beta function; falls back to the
/// normal approximation for large `df`.
fn t_distribution_cdf(t: f64, df: f64) -> f64 {
    if df > 100.0 {
        return normal_cdf(t);
    }
    let x = df / (df + t * t);
    let prob = incomplete_beta(df / 2.0, 0.5, x);
    if t >= 0.0 {
        1.0 - prob / 2.0
    } else {
        prob / 2.0
    }
}

fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Abramowitz-Stegun rational approximation, |error| < 1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + 0.3275911 * x);
    let y = 1.0
        - (((((1.061405429 * t - 1.453152027) * t) + 1.421413741) * t - 0.284496736) * t
            + 0.254829592)
            * t
            * (-x * x).exp();
    sign * y
}

/// Regularized incomplete beta function I_x(a, b).
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_beta = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b);
    let bt = (ln_beta + a * x.ln() + b * (1.0 - x).ln()).exp();

    if x < (a + 1.0) / (a + b + 2.0) {
        bt * betacf(a, b, x) / a
    } else {
        1.0 - bt * betacf(b, a, 1.0 - x) / b
    }
}

/// Continued fraction for the incomplete beta function (Lentz's method).
fn betacf(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 3.0e-12;
    const FPMIN: f64 = 1.0e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;

        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Lanczos approximation of ln Γ(x).
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.120_865_097_386_617_9e-2,
        -0.539_523_938_495_3e-5,
    ];

    let y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut ser = 1.000_000_000_190_015;
    let mut y = y;
    for &c in &COEFFS {
        y += 1.0;
        ser += c / y;
    }
    -tmp + (2.506_628_274_631_000_5 * ser / x).ln()
}

/// Accumulated summary for one cancer/target run.
///
/// Every metric column is the mean of the corresponding per-trial value.
/// The t-test compares the accuracy series against its own empirical
/// mean, so a healthy run reports a t-score near zero and a p-value
/// near one; large deviations signal a broken accumulation.
#[derive(Debug, Clone)]
pub struct SummaryStatistics {
    /// Cancer context derived from the input file name.
    pub cancer: String,
    /// Target column display name.
    pub target: String,
    /// Mean cross-validation accuracy.
    pub cv_accuracy: f64,
    /// Mean out-of-bag accuracy.
    pub oob_accuracy: f64,
    /// Mean holdout accuracy.
    pub mean_accuracy: f64,
    /// Sample standard deviation of holdout accuracy.
    pub sigma: f64,
    /// Mean Cohen's kappa.
    pub kappa: f64,
    /// Mean micro-averaged F1.
    pub micro_f1: f64,
    /// Mean Matthews correlation coefficient.
    pub mcc: f64,
    /// Mean micro-averaged precision.
    pub precision: f64,
    /// Mean micro-averaged recall.
    pub recall: f64,
    /// Mean precision of the upregulated class.
    pub up_precision: f64,
    /// Mean recall of the upregulated class.
    pub up_recall: f64,
    /// Mean precision of the downregulated class.
    pub down_precision: f64,
    /// Mean recall of the downregulated class.
    pub down_recall: f64,
    /// One-sample t statistic of the accuracy series.
    pub t_score: f64,
    /// Two-tailed p-value, floored at [`P_VALUE_FLOOR`].
    pub p_value: f64,
    /// Number of completed trials.
    pub n_trials: usize,
    /// Number of failed trials.
    pub n_failed: usize,
}

impl SummaryStatistics {
    /// Aggregate per-trial metrics into one summary row.
    #[must_use]
    pub fn from_trials(
        cancer: &str,
        target: &Target,
        trials: &[TrialMetrics],
        n_failed: usize,
    ) -> Self {
        let accuracies: Vec<f64> = trials.iter().map(|t| t.accuracy).collect();
        let mean_accuracy = mean(&accuracies);
        let sigma = sample_std(&accuracies);
        let (t_score, p_value) = one_sample_t_test(&accuracies, mean_accuracy);

        let avg = |f: fn(&TrialMetrics) -> f64| mean(&trials.iter().map(f).collect::<Vec<f64>>());

        Self {
            cancer: cancer.to_string(),
            target: target.column().to_string(),
            cv_accuracy: avg(|t| t.cv_accuracy),
            oob_accuracy: avg(|t| t.oob_accuracy),
            mean_accuracy,
            sigma,
            kappa: avg(|t| t.kappa),
            micro_f1: avg(|t| t.micro_f1),
            mcc: avg(|t| t.mcc),
            precision: avg(|t| t.precision),
            recall: avg(|t| t.recall),
            up_precision: avg(|t| t.up_precision),
            up_recall: avg(|t| t.up_recall),
            down_precision: avg(|t| t.down_precision),
            down_recall: avg(|t| t.down_recall),
            t_score,
            p_value,
            n_trials: trials.len(),
            n_failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std_basic() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-12);
        // Sample variance 32/7.
        assert!((sample_std(&values) - (32.0 / 7.0f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn t_test_against_own_mean_is_null() {
        let values = [0.7, 0.72, 0.68, 0.71, 0.69];
        let (t, p) = one_sample_t_test(&values, mean(&values));
        assert!(t.abs() < 1e-10, "t = {t}");
        assert!((p - 1.0).abs() < 1e-6, "p = {p}");
    }

    #[test]
    fn t_test_degenerate_series() {
        assert_eq!(one_sample_t_test(&[0.5], 0.3), (0.0, 1.0));
        assert_eq!(one_sample_t_test(&[0.5, 0.5, 0.5], 0.3), (0.0, 1.0));
    }

    #[test]
    fn t_test_known_statistic() {
        // mean 3, s = sqrt(2.5), n = 5: t against mu=0 is 3*sqrt(5)/sqrt(2.5).
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let (t, _) = one_sample_t_test(&values, 0.0);
        assert!((t - 4.242640687119285).abs() < 1e-9, "t = {t}");
    }

    #[test]
    fn t_test_p_value_floor() {
        // Tiny spread far from mu drives the p-value into the clamp.
        let values: Vec<f64> = (0..50).map(|i| 100.0 + (i % 2) as f64 * 1e-9).collect();
        let (t, p) = one_sample_t_test(&values, 0.0);
        assert!(t > 1e9);
        assert_eq!(p, P_VALUE_FLOOR);
    }

    #[test]
    fn t_cdf_symmetry() {
        for &df in &[3.0, 10.0, 30.0] {
            for &t in &[0.5, 1.0, 2.5] {
                let upper = t_distribution_cdf(t, df);
                let lower = t_distribution_cdf(-t, df);
                assert!((upper + lower - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn t_cdf_reference_values() {
        // t=2.0, df=10: CDF = 0.96331.
        assert!((t_distribution_cdf(2.0, 10.0) - 0.96331).abs() < 1e-4);
        // t=0 is the median for any df.
        assert!((t_distribution_cdf(0.0, 5.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn normal_approximation_large_df() {
        // df > 100 switches to the normal CDF; both branches should
        // agree within the erf approximation error.
        let exact = t_distribution_cdf(1.5, 100.0);
        let approx = t_distribution_cdf(1.5, 101.0);
        assert!((exact - approx).abs() < 5e-3);
    }

    #[test]
    fn summary_from_trials_averages_columns() {
        use oncofit_rf::ConfusionMatrix;

        let cm_good = ConfusionMatrix::from_labels(&[0, 1, 2], &[0, 1, 2], 3).unwrap();
        let cm_bad = ConfusionMatrix::from_labels(&[0, 1, 2], &[1, 1, 1], 3).unwrap();
        let trials = vec![
            TrialMetrics::from_trial(&cm_good, 0.9, 0.8),
            TrialMetrics::from_trial(&cm_bad, 0.3, 0.4),
        ];
        let summary =
            SummaryStatistics::from_trials("breast", &Target::new("TCGA_annot"), &trials, 1);

        assert_eq!(summary.cancer, "breast");
        assert_eq!(summary.target, "TCGA_annot");
        assert!((summary.mean_accuracy - (1.0 + 1.0 / 3.0) / 2.0).abs() < 1e-12);
        assert!((summary.cv_accuracy - 0.6).abs() < 1e-12);
        assert!((summary.oob_accuracy - 0.6).abs() < 1e-12);
        assert_eq!(summary.n_trials, 2);
        assert_eq!(summary.n_failed, 1);
        assert!((summary.p_value - 1.0).abs() < 1e-6);
    }
}
