use serde_json::json;
use tickwarden_core::{DataConfig, Symbol};

use crate::cli::{CacheArgs, CacheCommand};
use crate::error::CliError;

use super::{open_warehouse, CommandResult};

pub fn run(args: &CacheArgs, config: &DataConfig) -> Result<CommandResult, CliError> {
    let warehouse = open_warehouse(config)?;
    let cache = warehouse.price_cache();

    match &args.command {
        CacheCommand::Stats => {
            let stats = cache.get_cache_stats()?;
            let db_path = warehouse.db_path().map(|path| path.display().to_string());
            Ok(CommandResult::json(json!({
                "db_path": db_path,
                "stats": stats,
            })))
        }
        CacheCommand::Cleanup => {
            let report = cache.cleanup_stale_cache()?;
            Ok(CommandResult::json(serde_json::to_value(report)?))
        }
        CacheCommand::Invalidate {
            symbol,
            older_than_days,
        } => {
            let instrument_id = match symbol {
                Some(raw) => {
                    let symbol = Symbol::parse(raw)?;
                    match warehouse.instruments().lookup(symbol.as_str())? {
                        Some(id) => Some(id),
                        None => {
                            return Ok(CommandResult::json(json!({ "deleted": 0 }))
                                .with_warning(format!("{symbol} has never been cached")));
                        }
                    }
                }
                None => None,
            };
            let deleted = cache.invalidate_cache(instrument_id, *older_than_days)?;
            Ok(CommandResult::json(json!({ "deleted": deleted })))
        }
    }
}
