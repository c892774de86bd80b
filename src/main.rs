use anyhow::Result;

use recsys_eval::cli::Command;
use recsys_eval::{error_message, handle_algorithms, handle_completions, handle_run, interpret};

fn main() {
    setup_logging();
    parse_and_execute().unwrap_or_else(|e| {
        eprintln!("{}", error_message(&e));
        std::process::exit(1);
    });
}

fn setup_logging() {
    sensible_env_logger::init!();
}

fn parse_and_execute() -> Result<()> {
    let command = interpret();
    execute_command(&command)
}

fn execute_command(command: &Command) -> Result<()> {
    match command {
        Command::Run(args) => handle_run(args),
        Command::Algorithms => handle_algorithms(),
        Command::Completions { shell } => handle_completions(*shell),
    }
}
