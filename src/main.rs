//! Review Stacking - command line entry point
//!
//! ```bash
//! review_stacking process --mode training
//! review_stacking train --config stacking.toml
//! review_stacking evaluate --reviews held_out.json
//! review_stacking tune --family random_forest --target bodies
//! review_stacking select-features
//! review_stacking predict
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use review_stacking::data::{write_predictions, write_product_table, FeatureTable};
use review_stacking::features::{AggregationMode, ProductAggregator};
use review_stacking::pipeline::{PipelineArtifacts, StackingPipeline, TuneTarget};
use review_stacking::utils::{load_config, Config};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "review_stacking")]
#[command(about = "Stacked 'Awesome?' classifier for grocery product reviews")]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Training,
    Evaluation,
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Bodies,
    Summaries,
    Stacking,
}

impl From<Target> for TuneTarget {
    fn from(target: Target) -> Self {
        match target {
            Target::Bodies => TuneTarget::Bodies,
            Target::Summaries => TuneTarget::Summaries,
            Target::Stacking => TuneTarget::Stacking,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a review file into the per-product feature table
    Process {
        #[arg(short, long, value_enum, default_value = "training")]
        mode: Mode,

        /// Review file (defaults to the configured file for the mode)
        #[arg(short, long)]
        reviews: Option<PathBuf>,

        /// Output CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Train both stages and save the artifacts
    Train {
        #[arg(short, long)]
        reviews: Option<PathBuf>,
    },

    /// Score labelled held-out reviews with saved artifacts
    Evaluate {
        #[arg(short, long)]
        reviews: PathBuf,
    },

    /// Grid search the hyperparameters of one estimator family
    Tune {
        /// random_forest, adaboost, gradient_boosting or svm
        #[arg(short, long)]
        family: String,

        #[arg(short, long, value_enum, default_value = "stacking")]
        target: Target,

        #[arg(short, long)]
        reviews: Option<PathBuf>,
    },

    /// Search the best stage-two feature subset
    SelectFeatures {
        /// Stacking table CSV with an Awesome? column; rebuilt from the
        /// training reviews when omitted
        #[arg(long)]
        table: Option<PathBuf>,
    },

    /// Predict unlabelled products with saved artifacts
    Predict {
        #[arg(short, long)]
        reviews: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("review_stacking=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    let output_dir = config.data.output_dir.clone();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let pipeline = StackingPipeline::new(config);
    let settings = pipeline.config().data.clone();

    match cli.command {
        Commands::Process {
            mode,
            reviews,
            output,
        } => {
            let (aggregator, default_reviews, name) = match mode {
                Mode::Training => (
                    ProductAggregator::new(AggregationMode::Training),
                    &settings.training_reviews,
                    "Groceries_Processed_training_Data.csv",
                ),
                Mode::Evaluation => (
                    ProductAggregator::new(AggregationMode::Evaluation),
                    &settings.test_reviews,
                    "Groceries_Processed_test_Data.csv",
                ),
            };
            let path = reviews.unwrap_or_else(|| default_reviews.clone());
            let rows = pipeline.process(&path, &aggregator)?;
            let output = output.unwrap_or_else(|| output_dir.join(name));
            write_product_table(&output, &rows, matches!(mode, Mode::Training))?;
            println!("Wrote {} products to {}", rows.len(), output.display());
        }

        Commands::Train { reviews } => {
            let path = reviews.unwrap_or_else(|| settings.training_reviews.clone());
            let rows = pipeline.process(&path, &ProductAggregator::training())?;
            let (artifacts, report) = pipeline.train(&rows)?;

            artifacts.save(&settings.artifacts_path())?;
            let table_path = output_dir.join("stacking_features.csv");
            report
                .stacking_table
                .save_csv(&table_path, Some(&report.stacking_labels))?;
            info!("Stacking table written to {}", table_path.display());

            println!("\nStage-two performance (out of fold)");
            println!("===================================");
            println!("{}", report.report);
            println!("Mean {}-fold F1: {:.4}", report.cv_f1.len(), report.mean_f1());
            if let Some(selection) = &report.selection {
                println!("Selected columns: {}", selection.columns.join(", "));
            }
        }

        Commands::Evaluate { reviews } => {
            let artifacts = PipelineArtifacts::load(&settings.artifacts_path())?;
            let rows = pipeline.process(&reviews, &ProductAggregator::training())?;
            let report = pipeline.evaluate(&artifacts, &rows)?;
            println!("\nHeld-out performance");
            println!("====================");
            println!("{}", report);
        }

        Commands::Tune {
            family,
            target,
            reviews,
        } => {
            let path = reviews.unwrap_or_else(|| settings.training_reviews.clone());
            let rows = pipeline.process(&path, &ProductAggregator::training())?;
            let result = pipeline.tune(&rows, &family, target.into())?;

            println!("\nGrid search: {}", family);
            println!("============");
            for (params, score) in &result.scores {
                let described: Vec<String> =
                    params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                println!("{:.4}  {}", score, described.join(", "));
            }
            println!("Best score: {:.4}", result.best_score);
            for (key, value) in &result.best_params {
                println!("  {} = {}", key, value);
            }
        }

        Commands::SelectFeatures { table } => {
            let selection = match table {
                Some(path) => {
                    let (table, labels) = FeatureTable::load_csv(&path)?;
                    let labels = labels
                        .with_context(|| format!("{} has no Awesome? column", path.display()))?;
                    pipeline.select_features_from_table(&table, &labels)?
                }
                None => {
                    let rows = pipeline
                        .process(&settings.training_reviews, &ProductAggregator::training())?;
                    pipeline.select_features(&rows)?
                }
            };

            println!("\nFeature selection");
            println!("=================");
            for (size, f1) in &selection.scores {
                println!("{:>3} features: macro F1 {:.4}", size, f1);
            }
            println!("Best size {} (F1 {:.4})", selection.size, selection.f1);
            println!("{}", selection.columns.join(", "));
        }

        Commands::Predict { reviews, output } => {
            let artifacts = PipelineArtifacts::load(&settings.artifacts_path())?;
            let path = reviews.unwrap_or_else(|| settings.test_reviews.clone());
            let rows = pipeline.process(&path, &ProductAggregator::evaluation())?;
            let predictions = pipeline.predict(&artifacts, &rows)?;

            let (ids, probabilities): (Vec<String>, Vec<f64>) = predictions.into_iter().unzip();
            let output = output.unwrap_or_else(|| output_dir.join("predictions.csv"));
            write_predictions(&output, &ids, &probabilities)?;
            let awesome = probabilities.iter().filter(|&&p| p >= 0.5).count();
            println!(
                "Predicted {} of {} products awesome; written to {}",
                awesome,
                ids.len(),
                output.display()
            );
        }
    }

    Ok(())
}
