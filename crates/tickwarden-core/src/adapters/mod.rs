//! Built-in vendors and the default registry.
//!
//! | Vendor | Methods |
//! |---|---|
//! | `yfinance` | `get_stock_data` |
//! | `alpha_vantage` | every method except `get_insider_sentiment` |
//! | `local` | every method; news aggregates `finnhub`, `reddit` and `google_news` files |
//!
//! HTTP vendors are wrapped in [`ResilientVendor`](crate::resilient::ResilientVendor)
//! so each gets its own circuit breaker and retry budget.

pub mod alpha_vantage;
pub mod local;
pub mod yfinance;

use std::path::PathBuf;
use std::sync::Arc;

use tickwarden_warehouse::resolve_tickwarden_home;

use crate::config::DataConfig;
use crate::domain::DataMethod;
use crate::http_client::HttpClient;
use crate::resilient::ResilientVendor;
use crate::vendor::{VendorBinding, VendorError, VendorId, VendorImplementation, VendorRegistry};

pub use alpha_vantage::AlphaVantageVendor;
pub use local::{LocalPrices, LocalText, LOCAL_NEWS_SOURCES};
pub use yfinance::YFinanceVendor;

pub const YFINANCE: &str = "yfinance";
pub const ALPHA_VANTAGE: &str = "alpha_vantage";
pub const LOCAL: &str = "local";

/// Offline data directory: `local_data_dir`, else `{TICKWARDEN_HOME}/data`.
pub fn local_data_dir(config: &DataConfig) -> PathBuf {
    config
        .local_data_dir
        .clone()
        .unwrap_or_else(|| resolve_tickwarden_home().join("data"))
}

/// Registry with every built-in vendor, registered in the order
/// `yfinance`, `alpha_vantage`, `local`.
pub fn builtin_registry(
    config: &DataConfig,
    http: Arc<dyn HttpClient>,
) -> Result<VendorRegistry, VendorError> {
    let mut registry = VendorRegistry::new();
    let parse = |value: &str| {
        VendorId::parse(value).map_err(|error| VendorError::internal(error.to_string()))
    };

    let resilient =
        |id: &VendorId, inner: Arc<dyn VendorImplementation>| -> Arc<dyn VendorImplementation> {
            Arc::new(ResilientVendor::new(
                id.clone(),
                inner,
                config.circuit_breaker.config(),
                config.retry.policy(),
            ))
        };

    let yfinance = parse(YFINANCE)?;
    let yahoo = resilient(
        &yfinance,
        Arc::new(YFinanceVendor::new(Arc::clone(&http), config.http_timeout_ms)?),
    );
    registry.register_single(DataMethod::GetStockData, yfinance, yahoo);

    let alpha_vantage = parse(ALPHA_VANTAGE)?;
    let alpha = resilient(
        &alpha_vantage,
        Arc::new(AlphaVantageVendor::new(
            Arc::clone(&http),
            config.alpha_vantage_api_key.clone(),
            config.http_timeout_ms,
        )?),
    );
    for method in DataMethod::ALL {
        if method != DataMethod::GetInsiderSentiment {
            registry.register_single(method, alpha_vantage.clone(), Arc::clone(&alpha));
        }
    }

    let local = parse(LOCAL)?;
    let root = local_data_dir(config);
    for method in DataMethod::ALL {
        let binding = match method {
            DataMethod::GetStockData => VendorBinding::Single(Arc::new(LocalPrices::new(&root))),
            DataMethod::GetNews | DataMethod::GetGlobalNews => VendorBinding::Multi(
                LOCAL_NEWS_SOURCES
                    .iter()
                    .map(|source| {
                        Arc::new(LocalText::news_source(&root, source))
                            as Arc<dyn VendorImplementation>
                    })
                    .collect(),
            ),
            other => VendorBinding::Single(Arc::new(LocalText::for_method(&root, other))),
        };
        registry.register(method, local.clone(), binding);
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpRequest, HttpResponse};

    struct OfflineHttpClient;

    impl HttpClient for OfflineHttpClient {
        fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, HttpError> {
            Err(HttpError::new("offline"))
        }
    }

    #[test]
    fn registers_builtin_vendors_in_order() {
        let registry = builtin_registry(&DataConfig::default(), Arc::new(OfflineHttpClient))
            .expect("registry");

        let names = |method| {
            registry
                .vendors_for(method)
                .iter()
                .map(|vendor| vendor.as_str().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(DataMethod::GetStockData), ["yfinance", "alpha_vantage", "local"]);
        assert_eq!(names(DataMethod::GetInsiderSentiment), ["local"]);
        assert!(matches!(
            registry.binding(DataMethod::GetNews, &VendorId::parse(LOCAL).expect("id")),
            Some(VendorBinding::Multi(sources)) if sources.len() == 3
        ));
    }
}
