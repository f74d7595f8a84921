use serde::Serialize;
use tickwarden_core::{DataConfig, DataMethod, EffectiveChain, MethodCategory, VendorId};

use crate::cli::ChainArgs;
use crate::error::CliError;

use super::{build_router, CommandResult};

#[derive(Debug, Serialize)]
struct ChainEntry {
    method: DataMethod,
    category: MethodCategory,
    optional: bool,
    skip: bool,
    configured: Vec<VendorId>,
    chain: Vec<VendorId>,
}

#[derive(Debug, Serialize)]
struct ChainResponseData {
    runtime_provider: String,
    runtime_is_local: bool,
    methods: Vec<ChainEntry>,
}

pub fn run(args: &ChainArgs, config: &DataConfig) -> Result<CommandResult, CliError> {
    let methods = match &args.method {
        Some(method) => vec![method.parse::<DataMethod>()?],
        None => DataMethod::ALL.to_vec(),
    };
    let router = build_router(config)?;

    let entries = methods
        .into_iter()
        .map(|method| {
            let (skip, configured, chain) = match router.effective_chain(method) {
                EffectiveChain::Skip => (true, Vec::new(), Vec::new()),
                EffectiveChain::Vendors { configured, chain } => (false, configured, chain),
            };
            ChainEntry {
                method,
                category: method.category(),
                optional: method.is_optional(),
                skip,
                configured,
                chain,
            }
        })
        .collect();

    let data = serde_json::to_value(ChainResponseData {
        runtime_provider: config.runtime_provider.clone(),
        runtime_is_local: config.runtime_is_local(),
        methods: entries,
    })?;
    Ok(CommandResult::json(data))
}
