mod cache;
mod chain;
mod fetch;
mod prices;

use std::sync::Arc;

use serde_json::Value;
use tickwarden_core::{
    builtin_registry, DataConfig, FallbackRouter, ReqwestHttpClient, Warehouse,
};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub enum CommandOutput {
    Json(Value),
    /// Printed verbatim, without the JSON envelope.
    Text(String),
}

pub struct CommandResult {
    pub output: CommandOutput,
    pub warnings: Vec<String>,
    pub degraded: bool,
}

impl CommandResult {
    pub fn json(data: Value) -> Self {
        Self {
            output: CommandOutput::Json(data),
            warnings: Vec::new(),
            degraded: false,
        }
    }

    pub fn text(text: String) -> Self {
        Self {
            output: CommandOutput::Text(text),
            warnings: Vec::new(),
            degraded: false,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_degraded(mut self, degraded: bool) -> Self {
        self.degraded = degraded;
        self
    }
}

pub fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let config = DataConfig::load(cli.config.as_deref())?;
    tracing::debug!(
        runtime_provider = %config.runtime_provider,
        runtime_is_local = config.runtime_is_local(),
        "configuration loaded"
    );

    match &cli.command {
        Command::Prices(args) => prices::run(args, &config),
        Command::Fetch(args) => fetch::run(args, &config),
        Command::Chain(args) => chain::run(args, &config),
        Command::Cache(args) => cache::run(args, &config),
    }
}

/// Router over the built-in vendors, as configured.
fn build_router(config: &DataConfig) -> Result<FallbackRouter, CliError> {
    let http = Arc::new(ReqwestHttpClient::new(config.http_timeout_ms));
    let registry = builtin_registry(config, http)?;
    Ok(FallbackRouter::from_config(config, registry))
}

fn open_warehouse(config: &DataConfig) -> Result<Warehouse, CliError> {
    Ok(Warehouse::open(config.cache.warehouse_config())?)
}
