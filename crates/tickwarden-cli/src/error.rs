use thiserror::Error;
use tickwarden_core::{ConfigError, RouteError, ValidationError, VendorError, WarehouseError};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("vendor setup failed: {0}")]
    VendorSetup(#[from] VendorError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("strict mode failed: answer is a degraded placeholder")]
    StrictModeViolation,

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Argument(_) => 2,
            Self::Route(RouteError::Validation(_)) => 2,
            Self::Route(RouteError::Cache(_)) | Self::Warehouse(_) => 6,
            Self::Route(_) => 3,
            Self::Serialization(_) => 4,
            Self::Config(_) | Self::VendorSetup(_) => 5,
            Self::StrictModeViolation => 7,
            Self::Io(_) => 10,
        }
    }
}
