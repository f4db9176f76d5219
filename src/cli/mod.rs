//! Command-line interface of the `koi` binary.

mod commands;
pub mod logging;

pub use commands::run_command;
pub use logging::LogLevel;

use crate::disposition::Mission;
use crate::model::ModelKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Kepler Object of Interest classification toolkit.
#[derive(Parser, Debug, Clone)]
#[command(name = "koi", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Train one model, evaluate it and save its artifacts
    Train(TrainArgs),
    /// Train every model family on the same split and compare them
    Compare(TrainArgs),
    /// Predict labels for a feature CSV with saved artifacts
    Predict(PredictArgs),
    /// Split a CSV into train and test files
    Split(SplitArgs),
    /// Map mission-specific dispositions to candidate / non-candidate
    Standardize(StandardizeArgs),
    /// Select the highest-SNR clean candidates and false positives
    Select(SelectArgs),
    /// Print column summaries and the class distribution
    Explore(ExploreArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// YAML training configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Labelled feature CSV (overrides the config)
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Label column (overrides the config)
    #[arg(long)]
    pub target: Option<String>,

    /// Model family; hyperparameters fall back to defaults when the family changes
    #[arg(short, long, value_enum)]
    pub model: Option<ModelKind>,

    /// Artifact directory (overrides the config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Seed for the split and the randomized models
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Directory written by `koi train`
    #[arg(short, long)]
    pub model_dir: PathBuf,

    /// Feature CSV to classify
    pub input: PathBuf,

    /// Write the input rows with prediction columns to this CSV
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SplitArgs {
    pub input: PathBuf,

    #[arg(long)]
    pub train_out: PathBuf,

    #[arg(long)]
    pub test_out: PathBuf,

    #[arg(long, default_value_t = crate::dataset::DEFAULT_TEST_SIZE)]
    pub test_size: f64,

    #[arg(long, default_value_t = crate::dataset::DEFAULT_SEED)]
    pub seed: u64,

    /// Keep the class proportions of this column in both files
    #[arg(long)]
    pub stratify: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct StandardizeArgs {
    pub input: PathBuf,

    #[arg(long, value_enum, default_value_t = Mission::Kepler)]
    pub mission: Mission,

    /// Output CSV; without it the input is rewritten after taking a backup
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
    pub input: PathBuf,

    #[arg(short, long)]
    pub output: PathBuf,

    /// Rows taken from each group
    #[arg(long, default_value_t = 1000)]
    pub per_class: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ExploreArgs {
    pub input: PathBuf,

    /// Label column for the class distribution
    #[arg(long, default_value = "koi_disposition")]
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train_overrides() {
        let cli = Cli::parse_from([
            "koi", "train", "--data", "koi.csv", "--model", "xgboost", "--seed", "7", "-v",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Command::Train(args) => {
                assert_eq!(args.data, Some(PathBuf::from("koi.csv")));
                assert_eq!(args.model, Some(ModelKind::GradientBoosting));
                assert_eq!(args.seed, Some(7));
                assert!(args.config.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_standardize_defaults() {
        let cli = Cli::parse_from(["koi", "standardize", "k2.csv", "--mission", "k2"]);
        match cli.command {
            Command::Standardize(args) => {
                assert_eq!(args.mission, Mission::K2);
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_split_defaults() {
        let cli = Cli::parse_from([
            "koi", "split", "in.csv", "--train-out", "a.csv", "--test-out", "b.csv",
        ]);
        match cli.command {
            Command::Split(args) => {
                assert_eq!(args.test_size, 0.2);
                assert_eq!(args.seed, 42);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
