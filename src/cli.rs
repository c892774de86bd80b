use std::path::PathBuf;

use clap::builder::TypedValueParser;
use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::config::settings::{DEFAULT_FOLDS, DEFAULT_SEED};
use crate::evaluation::{ColdStartPolicy, Metric};
use crate::reporting::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about = "Cross-validated accuracy of rating prediction algorithms")]
pub struct Cli {
    /// Command
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
#[clap(rename_all = "lower_case")]
pub enum Command {
    /// Cross-validate an algorithm on a ratings file
    Run(RunArgs),
    /// List registered algorithms and their options
    Algorithms,
    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct RunArgs {
    /// Delimited ratings file with a header row
    pub dataset: PathBuf,

    /// Registered algorithm name (see `algorithms`)
    pub algorithm: String,

    /// JSON file with hyperparameters for the algorithm
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of folds
    #[arg(short = 'k', long, default_value_t = DEFAULT_FOLDS, value_parser = clap::value_parser!(u64).range(2..).map(|k| k as usize))]
    pub folds: usize,

    /// Seed for the fold shuffle and the stochastic algorithms
    #[arg(short, long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Folds evaluated in parallel
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Metrics to report, comma separated
    #[arg(short, long, value_enum, value_delimiter = ',', default_values_t = [Metric::Rmse, Metric::Mae])]
    pub metrics: Vec<Metric>,

    /// Handling of held-out ratings whose user or item is not in training
    #[arg(long, value_enum, default_value_t = ColdStartPolicy::GlobalMean)]
    pub cold_start: ColdStartPolicy,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(long, default_value = "user_id")]
    pub user_column: String,

    #[arg(long, default_value = "item_id")]
    pub item_column: String,

    #[arg(long, default_value = "score")]
    pub score_column: String,

    /// Field delimiter (a single ASCII character)
    #[arg(short, long, default_value = ",", value_parser = parse_delimiter)]
    pub delimiter: u8,
}

fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "\\t" | "tab" => Ok(b'\t'),
        _ => match value.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(format!("delimiter must be a single ASCII character, got {value:?}")),
        },
    }
}
