use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use oncofit_eval::{
    AblationEngine, AblationReport, FeatureGroup, GroupManifest, SummaryStatistics,
    TrialAggregator, class_median_correlation, compute_auroc,
};
use oncofit_io::{
    AblationRow, AblationSkipRow, AurocRow, CorrelationRow, Dataset, DatasetReader, ResultWriter,
    RunName, SummaryRow, Target, cancer_context,
};
use oncofit_rf::GrowthSchedule;

#[derive(Parser)]
#[command(name = "oncofit")]
#[command(about = "Repeated stochastic evaluation of metabolic gene regulation models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Input and output selection shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Path to the input CSV (the cancer context is its file stem)
    #[arg(long)]
    data: PathBuf,

    /// Target column to predict (CNV uses the GAIN/NEUT/LOSS alphabet)
    #[arg(long)]
    target: String,

    /// Columns to drop entirely, typically the unused target columns
    #[arg(long)]
    exclude: Vec<String>,

    /// Run name used as the output file prefix
    #[arg(long)]
    run: String,

    /// Output directory for result files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

/// Tree-count growth schedule for trial-based commands.
#[derive(Args, Debug, Clone)]
struct ScheduleArgs {
    /// Initial number of trees in the growth schedule
    #[arg(long, default_value_t = 64)]
    initial_trees: usize,

    /// Maximum number of trees in the growth schedule
    #[arg(long, default_value_t = 128)]
    max_trees: usize,

    /// Tree-count increment between schedule steps
    #[arg(long, default_value_t = 64)]
    tree_step: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Run repeated randomized trials and accumulate their confusion matrices
    Summarize {
        #[command(flatten)]
        data: DataArgs,

        /// Number of independent trials
        #[arg(long, default_value_t = 100)]
        iterations: usize,

        /// Fraction of samples held out per trial
        #[arg(long, default_value_t = 0.3)]
        test_fraction: f64,

        /// Number of cross-validation folds per trial
        #[arg(long, default_value_t = 10)]
        cv_folds: usize,

        #[command(flatten)]
        schedule: ScheduleArgs,
    },

    /// Sweep each retained feature group over the feature-count grid
    AblateFeatures {
        #[command(flatten)]
        data: DataArgs,

        /// Path to the JSON group manifest (group name to column list)
        #[arg(long)]
        manifest: PathBuf,

        #[command(flatten)]
        sweep: SweepArgs,
    },

    /// Sweep the full feature matrix once per held-out cell line
    AblateCells {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        sweep: SweepArgs,
    },

    /// Compute micro-averaged and per-class one-vs-rest AUROC
    Auroc {
        #[command(flatten)]
        data: DataArgs,
    },

    /// Correlate per-class feature medians against the ordinal gradient
    Correlate {
        #[command(flatten)]
        data: DataArgs,
    },
}

/// Holdout fraction and skip thresholds shared by the ablation commands.
#[derive(Args, Debug, Clone)]
struct SweepArgs {
    /// Fraction of samples held out per measurement
    #[arg(long, default_value_t = 0.3)]
    test_fraction: f64,

    /// Minimum row count below which a sweep unit is skipped
    #[arg(long, default_value_t = 10)]
    min_rows: usize,
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct SummarizeOutput {
    run: String,
    cancer: String,
    target: String,
    n_trials: usize,
    n_failed: usize,
    mean_accuracy: f64,
    sigma: f64,
    kappa: f64,
    mcc: f64,
    t_score: f64,
    p_value: f64,
}

#[derive(Serialize)]
struct AblationOutput {
    run: String,
    cancer: String,
    target: String,
    n_rows: usize,
    n_skipped: usize,
}

#[derive(Serialize)]
struct AurocOutput {
    run: String,
    cancer: String,
    target: String,
    auroc: f64,
}

#[derive(Serialize)]
struct CorrelateOutput {
    run: String,
    cancer: String,
    n_features: usize,
    strongest_feature: String,
    strongest_correlation: f64,
}

fn parse_group(name: &str) -> Result<FeatureGroup> {
    match name {
        "topological" => Ok(FeatureGroup::Topological),
        "dynamic" => Ok(FeatureGroup::Dynamic),
        "expression-kcat" => Ok(FeatureGroup::ExpressionKcat),
        "expression-only" => Ok(FeatureGroup::ExpressionOnly),
        "subsystem-only" => Ok(FeatureGroup::SubsystemOnly),
        other => anyhow::bail!(
            "unknown feature group `{other}` (expected topological, dynamic, \
             expression-kcat, expression-only, or subsystem-only)"
        ),
    }
}

fn load_manifest(path: &Path) -> Result<GroupManifest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let raw: BTreeMap<String, Vec<String>> =
        serde_json::from_str(&text).context("manifest is not a JSON object of column lists")?;

    let mut manifest = GroupManifest::new();
    for (name, columns) in raw {
        manifest = manifest.assign(parse_group(&name)?, columns);
    }
    Ok(manifest)
}

fn read_dataset(args: &DataArgs) -> Result<(Dataset, Target, String)> {
    let target = Target::new(args.target.clone());
    let dataset = DatasetReader::new(&args.data, target.clone())
        .with_excluded_columns(args.exclude.clone())
        .read()
        .context("failed to read input CSV")?;
    let cancer = cancer_context(&args.data);
    info!(
        cancer,
        n_samples = dataset.n_samples(),
        n_features = dataset.n_features(),
        "dataset loaded"
    );
    Ok((dataset, target, cancer))
}

fn summary_row(summary: &SummaryStatistics) -> SummaryRow {
    SummaryRow {
        cancer: summary.cancer.clone(),
        target: summary.target.clone(),
        cv_accuracy: summary.cv_accuracy,
        oob_accuracy: summary.oob_accuracy,
        mean_accuracy: summary.mean_accuracy,
        sigma: summary.sigma,
        kappa: summary.kappa,
        micro_f1: summary.micro_f1,
        mcc: summary.mcc,
        precision: summary.precision,
        recall: summary.recall,
        up_precision: summary.up_precision,
        up_recall: summary.up_recall,
        down_precision: summary.down_precision,
        down_recall: summary.down_recall,
        t_score: summary.t_score,
        p_value: summary.p_value,
        n_trials: summary.n_trials,
        n_failed: summary.n_failed,
    }
}

fn ablation_rows(report: &AblationReport, cancer: &str) -> (Vec<AblationRow>, Vec<AblationSkipRow>) {
    let rows = report
        .rows
        .iter()
        .map(|r| AblationRow {
            cancer: r.cancer.clone(),
            target: r.target.clone(),
            group: r.group.map(|g| g.name().to_string()),
            held_out_cell_line: r.held_out_cell_line.as_ref().map(|c| c.as_str().to_string()),
            n_features: r.n_features,
            accuracy: r.accuracy,
        })
        .collect();
    let skips = report
        .skipped
        .iter()
        .map(|s| AblationSkipRow {
            cancer: cancer.to_string(),
            group: s.group.map(|g| g.name().to_string()),
            held_out_cell_line: s.held_out_cell_line.as_ref().map(|c| c.as_str().to_string()),
            reason: s.reason.to_string(),
        })
        .collect();
    (rows, skips)
}

fn write_ablation_report(data: &DataArgs, report: &AblationReport, target: &Target, cancer: String) -> Result<()> {
    let run_name = RunName::new(data.run.clone())?;
    let (rows, skips) = ablation_rows(report, &cancer);
    let writer = ResultWriter::new(&data.output_dir, run_name)?;
    writer.write_ablation(&rows, &skips)?;

    let output = AblationOutput {
        run: data.run.clone(),
        cancer,
        target: target.column().to_string(),
        n_rows: rows.len(),
        n_skipped: skips.len(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Summarize {
            data,
            iterations,
            test_fraction,
            cv_folds,
            schedule,
        } => {
            let run_name = RunName::new(data.run.clone())?;
            let (dataset, target, cancer) = read_dataset(&data)?;

            let growth = GrowthSchedule::new(
                schedule.initial_trees,
                schedule.max_trees,
                schedule.tree_step,
            )?;
            let aggregator = TrialAggregator::new(iterations)?
                .with_test_fraction(test_fraction)
                .with_schedule(growth)
                .with_cv_folds(cv_folds)
                .with_seed(cli.seed);

            let report = aggregator
                .run(&dataset, &target, &cancer)
                .context("trial aggregation failed")?;

            let writer = ResultWriter::new(&data.output_dir, run_name)?;
            writer.write_confusion(
                target.alphabet(),
                report.confusion.as_rows(),
                &report.normalized,
            )?;
            writer.write_summary(&[summary_row(&report.summary)])?;

            let output = SummarizeOutput {
                run: data.run,
                cancer,
                target: target.column().to_string(),
                n_trials: report.n_trials_completed,
                n_failed: report.n_failed_trials,
                mean_accuracy: report.summary.mean_accuracy,
                sigma: report.summary.sigma,
                kappa: report.summary.kappa,
                mcc: report.summary.mcc,
                t_score: report.summary.t_score,
                p_value: report.summary.p_value,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::AblateFeatures {
            data,
            manifest,
            sweep,
        } => {
            let (dataset, target, cancer) = read_dataset(&data)?;
            let manifest = load_manifest(&manifest)?;
            let report = AblationEngine::new()
                .with_test_fraction(sweep.test_fraction)
                .with_min_rows(sweep.min_rows)
                .with_seed(cli.seed)
                .leave_feature_group_out(&dataset, &target, &cancer, &manifest)
                .context("feature-group ablation failed")?;
            write_ablation_report(&data, &report, &target, cancer)?;
        }

        Command::AblateCells { data, sweep } => {
            let (dataset, target, cancer) = read_dataset(&data)?;
            let report = AblationEngine::new()
                .with_test_fraction(sweep.test_fraction)
                .with_min_rows(sweep.min_rows)
                .with_seed(cli.seed)
                .leave_cell_line_out(&dataset, &target, &cancer)
                .context("cell-line ablation failed")?;
            write_ablation_report(&data, &report, &target, cancer)?;
        }

        Command::Auroc { data } => {
            let run_name = RunName::new(data.run.clone())?;
            let (dataset, target, cancer) = read_dataset(&data)?;

            let summary = compute_auroc(&dataset, &target, &cancer, cli.seed)
                .context("AUROC computation failed")?;

            let writer = ResultWriter::new(&data.output_dir, run_name)?;
            writer.write_auroc(&[AurocRow {
                cancer: summary.cancer.clone(),
                target: summary.target.clone(),
                auroc: summary.auroc,
                up_auroc: summary.per_class[0],
                neutral_auroc: summary.per_class[1],
                down_auroc: summary.per_class[2],
            }])?;

            let output = AurocOutput {
                run: data.run,
                cancer,
                target: target.column().to_string(),
                auroc: summary.auroc,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Correlate { data } => {
            let run_name = RunName::new(data.run.clone())?;
            let (dataset, _target, cancer) = read_dataset(&data)?;

            let correlations = class_median_correlation(&dataset);
            let strongest = correlations
                .iter()
                .max_by(|a, b| a.correlation.abs().total_cmp(&b.correlation.abs()))
                .context("dataset has no feature columns")?;

            let rows: Vec<CorrelationRow> = correlations
                .iter()
                .map(|c| CorrelationRow {
                    feature: c.feature.clone(),
                    correlation: c.correlation,
                })
                .collect();
            let writer = ResultWriter::new(&data.output_dir, run_name)?;
            writer.write_correlation(&rows)?;

            let output = CorrelateOutput {
                run: data.run,
                cancer,
                n_features: correlations.len(),
                strongest_feature: strongest.feature.clone(),
                strongest_correlation: strongest.correlation,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
