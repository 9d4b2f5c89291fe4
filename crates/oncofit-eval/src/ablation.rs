//! Feature-group and leave-one-cell-line-out ablation sweeps.

use oncofit_io::{CellLine, Dataset, Target, oversample, robust_scale, train_test_split};
use oncofit_rf::{GrowthSchedule, MaxFeatures, RandomForestConfig};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::error::EvalError;

/// The named feature groups the ablation sweep evaluates.
///
/// Each group is a retained column subset described by a
/// [`GroupManifest`]; the sweep measures how well the retained columns
/// alone predict the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureGroup {
    /// Network topology columns.
    Topological,
    /// Flux and kinetic dynamics columns.
    Dynamic,
    /// Gene expression plus catalytic rate columns.
    ExpressionKcat,
    /// Gene expression columns alone.
    ExpressionOnly,
    /// Metabolic subsystem membership columns alone.
    SubsystemOnly,
}

impl FeatureGroup {
    /// All groups in sweep order.
    pub const ALL: [FeatureGroup; 5] = [
        FeatureGroup::Topological,
        FeatureGroup::Dynamic,
        FeatureGroup::ExpressionKcat,
        FeatureGroup::ExpressionOnly,
        FeatureGroup::SubsystemOnly,
    ];

    /// Display name used in result rows.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            FeatureGroup::Topological => "Topological features",
            FeatureGroup::Dynamic => "Dynamic features",
            FeatureGroup::ExpressionKcat => "Gene expression and kcat",
            FeatureGroup::ExpressionOnly => "Gene expression only",
            FeatureGroup::SubsystemOnly => "Subsystem only",
        }
    }
}

impl std::fmt::Display for FeatureGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps each feature group to the column names it retains.
///
/// Columns are matched by name against the dataset header, never by
/// position, so a reordered input file cannot silently shift a group's
/// boundary.
#[derive(Debug, Clone, Default)]
pub struct GroupManifest {
    assignments: Vec<(FeatureGroup, Vec<String>)>,
}

impl GroupManifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the named columns to a group, replacing any prior assignment.
    #[must_use]
    pub fn assign(mut self, group: FeatureGroup, columns: Vec<String>) -> Self {
        self.assignments.retain(|(g, _)| *g != group);
        self.assignments.push((group, columns));
        self
    }

    /// Resolve a group's column names to indices into `feature_names`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`EvalError::EmptyManifest`] | Group unassigned or assigned zero columns |
    /// | [`EvalError::UnknownManifestColumn`] | A named column is not in the header |
    pub fn resolve(
        &self,
        group: FeatureGroup,
        feature_names: &[String],
    ) -> Result<Vec<usize>, EvalError> {
        let columns = self
            .assignments
            .iter()
            .find(|(g, _)| *g == group)
            .map(|(_, cols)| cols.as_slice())
            .filter(|cols| !cols.is_empty())
            .ok_or_else(|| EvalError::EmptyManifest {
                group: group.name().to_string(),
            })?;

        columns
            .iter()
            .map(|col| {
                feature_names
                    .iter()
                    .position(|name| name == col)
                    .ok_or_else(|| EvalError::UnknownManifestColumn {
                        column: col.clone(),
                    })
            })
            .collect()
    }
}

/// Why a group (or group/cell-line pair) produced no measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Too few rows remained after filtering.
    TooFewRows {
        /// Rows remaining.
        n_rows: usize,
    },
    /// Fewer than two classes remained after filtering.
    MissingClassDiversity {
        /// Distinct classes remaining.
        n_classes_present: usize,
    },
    /// Too few retained columns for the grid to visit any point.
    TooFewFeatures {
        /// Columns retained.
        n_features: usize,
    },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::TooFewRows { n_rows } => write!(f, "too few rows: {n_rows}"),
            SkipReason::MissingClassDiversity { n_classes_present } => {
                write!(f, "missing class diversity: {n_classes_present} classes")
            }
            SkipReason::TooFewFeatures { n_features } => {
                write!(f, "too few features: {n_features}")
            }
        }
    }
}

/// One scored grid point.
#[derive(Debug, Clone)]
pub struct AblationResult {
    /// Cancer context.
    pub cancer: String,
    /// Target column display name.
    pub target: String,
    /// The retained feature group; `None` when the sweep ran over the
    /// full feature matrix.
    pub group: Option<FeatureGroup>,
    /// Excluded cell line, when sweeping cell lines.
    pub held_out_cell_line: Option<CellLine>,
    /// Features considered per split at this grid point.
    pub n_features: usize,
    /// Holdout accuracy of the scored fit.
    pub accuracy: f64,
}

/// A sweep unit that produced no measurement, with the reason.
#[derive(Debug, Clone)]
pub struct SkippedGroup {
    /// The retained feature group; `None` for a full-matrix sweep.
    pub group: Option<FeatureGroup>,
    /// Excluded cell line, when sweeping cell lines.
    pub held_out_cell_line: Option<CellLine>,
    /// Why the group was skipped.
    pub reason: SkipReason,
}

/// All measurements and skips from one ablation run.
#[derive(Debug, Default)]
pub struct AblationReport {
    /// Scored grid points.
    pub rows: Vec<AblationResult>,
    /// Groups that produced no measurement.
    pub skipped: Vec<SkippedGroup>,
}

enum SweepOutcome {
    Rows(Vec<(usize, f64)>),
    Skipped(SkipReason),
}

/// Sweeps feature groups (and optionally cell lines) over a coarse
/// feature-count grid.
///
/// The grid starts ten below the retained column count and steps by
/// twenty; each grid point trains through an inner tree schedule and
/// scores only the final fit on the holdout.
#[derive(Debug, Clone)]
pub struct AblationEngine {
    test_fraction: f64,
    min_rows: usize,
    inner_schedule: GrowthSchedule,
    seed: u64,
}

impl Default for AblationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AblationEngine {
    const FEAT_OFFSET: usize = 10;
    const FEAT_STEP: usize = 20;

    /// Create an engine with a 30% holdout, a 10-row minimum, and the
    /// historical inner schedule (5 trees, step 1500, cap 500 — a
    /// single fit per grid point).
    #[must_use]
    pub fn new() -> Self {
        Self {
            test_fraction: 0.3,
            min_rows: 10,
            inner_schedule: GrowthSchedule::new(5, 500, 1500)
                .expect("historical schedule is valid"),
            seed: 42,
        }
    }

    /// Set the holdout fraction.
    #[must_use]
    pub fn with_test_fraction(mut self, test_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self
    }

    /// Set the minimum row count below which a group is skipped.
    #[must_use]
    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }

    /// Set the inner tree-count schedule.
    #[must_use]
    pub fn with_inner_schedule(mut self, schedule: GrowthSchedule) -> Self {
        self.inner_schedule = schedule;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Evaluate every feature group on the full sample set.
    ///
    /// # Errors
    ///
    /// Returns manifest resolution errors, or forwards training errors.
    /// Degenerate groups are recorded as skips, not errors.
    #[instrument(skip_all, fields(cancer, target = %target))]
    pub fn leave_feature_group_out(
        &self,
        dataset: &Dataset,
        target: &Target,
        cancer: &str,
        manifest: &GroupManifest,
    ) -> Result<AblationReport, EvalError> {
        let mut scaled = dataset.clone();
        robust_scale(&mut scaled);

        let mut master_rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut report = AblationReport::default();

        for group in FeatureGroup::ALL {
            let columns = manifest.resolve(group, scaled.feature_names())?;
            let restricted = scaled.restrict_columns(&columns);
            let group_seed: u64 = master_rng.r#gen();

            match self.sweep_feature_grid(&restricted, false, group_seed)? {
                SweepOutcome::Rows(points) => {
                    for (n_features, accuracy) in points {
                        report.rows.push(AblationResult {
                            cancer: cancer.to_string(),
                            target: target.column().to_string(),
                            group: Some(group),
                            held_out_cell_line: None,
                            n_features,
                            accuracy,
                        });
                    }
                }
                SweepOutcome::Skipped(reason) => {
                    debug!(group = %group, reason = %reason, "group skipped");
                    report.skipped.push(SkippedGroup {
                        group: Some(group),
                        held_out_cell_line: None,
                        reason,
                    });
                }
            }
        }

        info!(
            n_rows = report.rows.len(),
            n_skipped = report.skipped.len(),
            "feature-group ablation complete"
        );
        Ok(report)
    }

    /// Sweep the full feature matrix once per held-out cell line,
    /// excluding that line's rows entirely before splitting.
    ///
    /// The training partition is oversampled to balance minority
    /// classes; the holdout is left untouched.
    ///
    /// # Errors
    ///
    /// Forwards splitting and training errors. Degenerate cell lines
    /// are recorded as skips, not errors.
    #[instrument(skip_all, fields(cancer, target = %target))]
    pub fn leave_cell_line_out(
        &self,
        dataset: &Dataset,
        target: &Target,
        cancer: &str,
    ) -> Result<AblationReport, EvalError> {
        let mut scaled = dataset.clone();
        robust_scale(&mut scaled);

        let mut master_rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut report = AblationReport::default();

        for cell_line in scaled.distinct_cell_lines() {
            let remaining = {
                let lines = scaled.cell_lines().to_vec();
                scaled.filter_rows(|i| lines[i] != cell_line)
            };
            let line_seed: u64 = master_rng.r#gen();

            match self.sweep_feature_grid(&remaining, true, line_seed)? {
                SweepOutcome::Rows(points) => {
                    for (n_features, accuracy) in points {
                        report.rows.push(AblationResult {
                            cancer: cancer.to_string(),
                            target: target.column().to_string(),
                            group: None,
                            held_out_cell_line: Some(cell_line.clone()),
                            n_features,
                            accuracy,
                        });
                    }
                }
                SweepOutcome::Skipped(reason) => {
                    debug!(cell_line = %cell_line, reason = %reason, "cell line skipped");
                    report.skipped.push(SkippedGroup {
                        group: None,
                        held_out_cell_line: Some(cell_line.clone()),
                        reason,
                    });
                }
            }
        }

        info!(
            n_rows = report.rows.len(),
            n_skipped = report.skipped.len(),
            "leave-one-cell-line-out ablation complete"
        );
        Ok(report)
    }

    fn sweep_feature_grid(
        &self,
        restricted: &Dataset,
        oversample_train: bool,
        seed: u64,
    ) -> Result<SweepOutcome, EvalError> {
        if restricted.n_samples() < self.min_rows {
            return Ok(SweepOutcome::Skipped(SkipReason::TooFewRows {
                n_rows: restricted.n_samples(),
            }));
        }
        let n_classes_present = restricted.n_classes_present();
        if n_classes_present < 2 {
            return Ok(SweepOutcome::Skipped(SkipReason::MissingClassDiversity {
                n_classes_present,
            }));
        }
        let total = restricted.n_features();
        if total < 3 {
            return Ok(SweepOutcome::Skipped(SkipReason::TooFewFeatures {
                n_features: total,
            }));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let split = train_test_split(restricted, self.test_fraction, &mut rng)?;
        let train = if oversample_train {
            oversample(&split.train, &mut rng)
        } else {
            split.train
        };

        let train_labels = train.labels_as_indices();
        let test_labels = split.test.labels_as_indices();

        let mut points = Vec::new();
        let mut feat = total.saturating_sub(Self::FEAT_OFFSET).max(1);
        while feat + 1 < total {
            let mut forest = None;
            for n_trees in self.inner_schedule.tree_counts() {
                let config = RandomForestConfig::new(n_trees)?
                    .with_max_features(MaxFeatures::Fixed(feat))
                    .with_seed(rng.r#gen());
                forest = Some(config.fit(train.features(), &train_labels)?);
            }
            // Only the final fit of the inner schedule is scored; with
            // the historical schedule that is the sole trees=5 fit.
            let forest = forest.expect("validated schedule yields at least one count");
            let accuracy = forest.score(split.test.features(), &test_labels)?;
            points.push((feat, accuracy));
            feat += Self::FEAT_STEP;
        }

        Ok(SweepOutcome::Rows(points))
    }
}
