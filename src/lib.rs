pub mod algorithms;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod evaluation;
pub mod reporting;
pub mod services;

use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use cli::Cli;

use crate::algorithms::REGISTRY;
use crate::cli::{Command, RunArgs};
use crate::config::settings::AppConfig;
use crate::config::{ColumnMapping, DatasetSettings, EvaluationSettings};
use crate::services::EvaluationService;

pub use crate::errors::EvalError;

/// One-line failure message for stderr, tagged with the error kind when the
/// chain carries an [`EvalError`].
pub fn error_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<EvalError>() {
        Some(eval) => format!("Error [{}]: {err:#}", eval.kind()),
        None => format!("Error: {err:#}"),
    }
}

pub fn interpret() -> Command {
    let cli = Cli::parse();
    cli.command
}

pub fn handle_run(args: &RunArgs) -> Result<()> {
    let config = app_config(args);
    let service = EvaluationService::new(config);
    service.run(&args.dataset, &args.algorithm, args.config.as_deref())
}

pub fn handle_algorithms() -> Result<()> {
    for registration in REGISTRY {
        println!("{:<18}{}", registration.name, registration.summary);
        for (option, default) in registration.options {
            println!("{:<18}  {option} = {default}", "");
        }
    }
    Ok(())
}

pub fn handle_completions(shell: Shell) -> Result<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, name, &mut io::stdout());
    Ok(())
}

pub fn app_config(args: &RunArgs) -> AppConfig {
    AppConfig {
        evaluation: EvaluationSettings {
            folds: args.folds,
            seed: args.seed,
            jobs: args.jobs,
            metrics: args.metrics.clone(),
            cold_start: args.cold_start,
        },
        dataset: DatasetSettings {
            columns: ColumnMapping {
                user: args.user_column.clone(),
                item: args.item_column.clone(),
                score: args.score_column.clone(),
            },
            delimiter: args.delimiter,
        },
        format: args.format,
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{Context, anyhow};

    use super::*;

    #[test]
    fn test_error_message_names_the_kind() {
        let err = anyhow::Error::from(EvalError::UnknownAlgorithm {
            name: "svdzzz".to_string(),
        });

        assert_eq!(error_message(&err), r#"Error [UnknownAlgorithmError]: unknown algorithm "svdzzz""#);
    }

    #[test]
    fn test_error_message_sees_through_context() {
        let err = Err::<(), _>(EvalError::EmptyDataset {
            origin: "ratings.csv".to_string(),
        })
        .context("evaluating svd")
        .unwrap_err();

        assert_eq!(
            error_message(&err),
            "Error [EmptyDatasetError]: evaluating svd: ratings.csv contains no ratings"
        );
    }

    #[test]
    fn test_error_message_without_kind() {
        let err = anyhow!("disk full");
        assert_eq!(error_message(&err), "Error: disk full");
    }
}
