//! # Tickwarden Core
//!
//! Resilient market-data access: ordered vendor fallback, resilience
//! primitives, and cache-aware price lookups.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Built-in vendors (Yahoo Finance, Alpha Vantage, local files) |
//! | [`cached`] | Read-through price router backed by the warehouse cache |
//! | [`circuit_breaker`] | Three-state circuit breaker |
//! | [`config`] | Data-layer configuration and parsed vendor chains |
//! | [`domain`] | Symbols, date ranges, methods, price series |
//! | [`error`] | Validation, configuration and routing errors |
//! | [`http_client`] | Blocking HTTP transport abstraction |
//! | [`logging`] | Subscriber setup for binaries |
//! | [`resilient`] | Retry and circuit breaker around a vendor |
//! | [`retry`] | Exponential backoff with jitter |
//! | [`routing`] | Vendor fallback router |
//! | [`session`] | Exchange session window |
//! | [`throttling`] | Local per-vendor request budgets |
//! | [`trace`] | Per-call routing audit record |
//! | [`vendor`] | Vendor contract, payloads and registry |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tickwarden_core::{
//!     builtin_registry, CachedPriceRouter, DataConfig, DateRange, FallbackRouter,
//!     ReqwestHttpClient, Symbol, Warehouse,
//! };
//!
//! let config = DataConfig::load(None)?;
//! let http = Arc::new(ReqwestHttpClient::new(config.http_timeout_ms));
//! let router = FallbackRouter::from_config(&config, builtin_registry(&config, http)?);
//! let warehouse = Warehouse::open(config.cache.warehouse_config())?;
//! let prices = CachedPriceRouter::new(Arc::new(router), warehouse, config.session.session()?);
//!
//! let lookup = prices.get_prices(&Symbol::parse("AAPL")?, DateRange::parse("2024-01-02", "2024-01-31")?)?;
//! println!("{} bars from {:?}", lookup.series.len(), lookup.origin);
//! ```

pub mod adapters;
pub mod cached;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod logging;
pub mod resilient;
pub mod retry;
pub mod routing;
pub mod session;
pub mod throttling;
pub mod trace;
pub mod vendor;

pub use adapters::{builtin_registry, AlphaVantageVendor, LocalPrices, LocalText, YFinanceVendor};
pub use cached::{CachedPriceRouter, PriceLookup, PriceOrigin};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitError, CircuitSnapshot, CircuitState,
};
pub use config::{DataConfig, VendorChain, VendorConfig};
pub use domain::{DataMethod, DateRange, MethodCategory, PriceSeries, Symbol, SymbolKind};
pub use error::{ConfigError, RouteError, ValidationError};
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use resilient::ResilientVendor;
pub use retry::{Retrier, RetryPolicy, Sleeper, ThreadSleeper};
pub use routing::{EffectiveChain, FallbackRouter, RoutedPayload};
pub use session::MarketSession;
pub use throttling::VendorThrottle;
pub use trace::{AttemptOutcome, RouteTrace, VendorAttempt};
pub use vendor::{
    VendorBinding, VendorError, VendorErrorKind, VendorId, VendorImplementation, VendorPayload,
    VendorRegistry, VendorRequest,
};

pub use tickwarden_warehouse::{
    CacheStats, CleanupReport, Clock, ManualClock, PriceBar, PriceCacheStore, PriceRecord,
    StalenessPolicy, SystemClock, Warehouse, WarehouseConfig, WarehouseError,
};
