use std::path::PathBuf;

use thiserror::Error;
use tickwarden_warehouse::WarehouseError;

use crate::domain::DataMethod;

/// Validation errors for user- and config-supplied values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },
    #[error("date range start {start} is after end {end}")]
    InvertedDateRange { start: String, end: String },

    #[error("unknown data method '{value}'")]
    UnknownMethod { value: String },
    #[error("unknown method category '{value}'")]
    UnknownCategory { value: String },

    #[error("vendor id cannot be empty")]
    EmptyVendorId,
    #[error("vendor id '{value}' may only contain lowercase letters, digits, '_' and '-'")]
    InvalidVendorId { value: String },
    #[error("vendor list for '{key}' names no vendors")]
    EmptyVendorChain { key: String },

    #[error("method '{method}' requires a symbol")]
    MissingSymbol { method: DataMethod },
    #[error("method '{method}' requires a date range")]
    MissingDateRange { method: DataMethod },

    #[error("invalid price series: {message}")]
    InvalidSeries { message: String },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("method '{method}' is required and cannot be configured as skip")]
    SkipOnRequired { method: DataMethod },

    #[error("invalid {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Failures surfaced by the routers. Vendor-local failures never appear here.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("method '{method}' is required and cannot be skipped")]
    SkipNotAllowed { method: DataMethod },

    #[error("all vendors failed for required method '{method}' ({attempted} attempted)")]
    AllVendorsFailed { method: DataMethod, attempted: usize },

    #[error("method '{method}' returned {actual} data where prices were expected")]
    UnexpectedPayload {
        method: DataMethod,
        actual: &'static str,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cache(#[from] WarehouseError),
}
