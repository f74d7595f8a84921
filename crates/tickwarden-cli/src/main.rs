mod cli;
mod commands;
mod error;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tickwarden_core::logging::{init_logging, LogConfig};

use crate::cli::Cli;
use crate::error::CliError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    if cli.verbose {
        log_config = log_config.with_default_level("debug");
    }
    if let Err(error) = init_logging(log_config) {
        eprintln!("warning: logging disabled: {error}");
    }

    match run(&cli) {
        Ok(code) => code,
        Err(error) => {
            tracing::error!(error = %error, exit_code = error.exit_code(), "command failed");
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let result = commands::run(cli)?;
    let degraded = result.degraded;
    output::render(result, cli.pretty)?;

    if cli.strict && degraded {
        return Err(CliError::StrictModeViolation);
    }
    Ok(ExitCode::SUCCESS)
}
