use serde::Serialize;
use tickwarden_core::{
    DataConfig, DataMethod, DateRange, PriceSeries, RouteTrace, Symbol, VendorPayload,
    VendorRequest,
};

use crate::cli::FetchArgs;
use crate::error::CliError;

use super::{build_router, CommandResult};

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum PayloadView {
    Prices { series: PriceSeries },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct FetchResponseData {
    method: DataMethod,
    payload: PayloadView,
    trace: RouteTrace,
}

pub fn run(args: &FetchArgs, config: &DataConfig) -> Result<CommandResult, CliError> {
    let request = build_request(args)?;
    let router = build_router(config)?;
    let routed = router.route(&request)?;

    let degraded = routed.trace.degraded;
    let payload = match routed.payload {
        VendorPayload::Prices(series) => PayloadView::Prices { series },
        VendorPayload::Text(text) => PayloadView::Text { text },
    };
    let data = serde_json::to_value(FetchResponseData {
        method: request.method,
        payload,
        trace: routed.trace,
    })?;

    let mut result = CommandResult::json(data).with_degraded(degraded);
    if degraded {
        result = result.with_warning(format!("{} returned a placeholder", request.method));
    }
    Ok(result)
}

fn build_request(args: &FetchArgs) -> Result<VendorRequest, CliError> {
    let method: DataMethod = args.method.parse()?;
    let mut request = VendorRequest::new(method);

    if let Some(symbol) = &args.symbol {
        request = request.with_symbol(Symbol::parse(symbol)?);
    }
    match (&args.start, &args.end) {
        (Some(start), Some(end)) => {
            request = request.with_range(DateRange::parse(start, end)?);
        }
        (None, None) => {}
        (Some(_), None) => {
            return Err(CliError::Argument(String::from("--start requires --end")));
        }
        (None, Some(_)) => {
            return Err(CliError::Argument(String::from("--end requires --start")));
        }
    }
    for param in &args.params {
        let (key, value) = parse_param(param)?;
        request = request.with_param(key, value);
    }
    Ok(request)
}

fn parse_param(raw: &str) -> Result<(&str, &str), CliError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(CliError::Argument(format!(
            "expected KEY=VALUE for --param, got '{raw}'"
        ))),
    }
}
