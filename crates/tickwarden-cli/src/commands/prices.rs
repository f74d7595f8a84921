use std::sync::Arc;

use tickwarden_core::{
    CachedPriceRouter, DataConfig, DataMethod, DateRange, FallbackRouter, PriceLookup,
    PriceOrigin, RouteError, Symbol, VendorPayload, VendorRequest,
};

use crate::cli::PricesArgs;
use crate::error::CliError;

use super::{build_router, open_warehouse, CommandResult};

pub fn run(args: &PricesArgs, config: &DataConfig) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let range = DateRange::parse(&args.start, &args.end)?;
    let router = build_router(config)?;

    let lookup = if args.no_cache {
        fetch_uncached(&router, symbol, range)?
    } else {
        let session = config.session.session()?;
        let prices = CachedPriceRouter::new(Arc::new(router), open_warehouse(config)?, session);
        prices.get_prices(&symbol, range)?
    };

    let mut warnings = Vec::new();
    if lookup.series.is_empty() {
        warnings.push(format!("no bars for {} in {}", lookup.symbol, lookup.range));
    }
    if let Some(trace) = lookup.trace.as_ref().filter(|trace| trace.fallback_occurred) {
        let served_by: Vec<&str> = trace.served_by.iter().map(|vendor| vendor.as_str()).collect();
        warnings.push(format!("served by fallback vendor(s): {}", served_by.join(",")));
    }

    let mut result = if args.csv {
        CommandResult::text(lookup.series.to_csv()?)
    } else {
        CommandResult::json(serde_json::to_value(&lookup)?)
    };
    for warning in warnings {
        result = result.with_warning(warning);
    }
    Ok(result)
}

fn fetch_uncached(
    router: &FallbackRouter,
    symbol: Symbol,
    range: DateRange,
) -> Result<PriceLookup, CliError> {
    let routed = router.route(&VendorRequest::prices(symbol.clone(), range))?;
    let series = match routed.payload {
        VendorPayload::Prices(series) => series,
        other => {
            return Err(RouteError::UnexpectedPayload {
                method: DataMethod::GetStockData,
                actual: other.kind(),
            }
            .into())
        }
    };
    Ok(PriceLookup {
        symbol,
        range,
        origin: PriceOrigin::Vendor,
        series,
        trace: Some(routed.trace),
    })
}
