//! Data-layer configuration.
//!
//! Loaded once from JSON and passed by reference into constructors. Vendor
//! priority strings (`"yfinance,alpha_vantage"` or `"skip"`) are parsed into
//! [`VendorChain`] values at load time and never re-parsed per call.
//!
//! ```json
//! {
//!   "category_defaults": { "core_stock_apis": "yfinance", "news_data": "local" },
//!   "method_overrides": { "get_stock_data": "alpha_vantage,yfinance", "get_insider_sentiment": "skip" },
//!   "runtime_provider": "openai",
//!   "retry": { "max_retries": 3, "initial_delay_ms": 1000 },
//!   "circuit_breaker": { "failure_threshold": 5, "timeout_secs": 60 }
//! }
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tickwarden_warehouse::{default_db_path, resolve_tickwarden_home, StalenessPolicy, WarehouseConfig};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::domain::{DataMethod, MethodCategory};
use crate::error::{ConfigError, ValidationError};
use crate::retry::RetryPolicy;
use crate::session::MarketSession;
use crate::vendor::VendorId;

const SKIP_TOKEN: &str = "skip";

/// Runtime providers that run locally and carry no hosted credentials.
pub const LOCAL_RUNTIME_PROVIDERS: [&str; 4] = ["ollama", "lmstudio", "llamacpp", "local"];

/// Parsed vendor priority for a method or category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "vendors", rename_all = "snake_case")]
pub enum VendorChain {
    /// Do not call any vendor.
    Skip,
    /// Vendors in priority order, deduplicated.
    Ordered(Vec<VendorId>),
}

impl VendorChain {
    /// Parse a comma-separated list. Any `skip` token makes the whole chain
    /// `Skip`; tokens are trimmed, lower-cased and de-duplicated.
    pub fn parse(key: &str, value: &str) -> Result<Self, ValidationError> {
        let tokens: Vec<String> = value
            .split(',')
            .map(|token| token.trim().to_ascii_lowercase())
            .filter(|token| !token.is_empty())
            .collect();

        if tokens.iter().any(|token| token == SKIP_TOKEN) {
            return Ok(Self::Skip);
        }

        let mut vendors: Vec<VendorId> = Vec::with_capacity(tokens.len());
        for token in tokens {
            let vendor = VendorId::parse(&token)?;
            if !vendors.contains(&vendor) {
                vendors.push(vendor);
            }
        }

        if vendors.is_empty() {
            return Err(ValidationError::EmptyVendorChain {
                key: key.to_string(),
            });
        }
        Ok(Self::Ordered(vendors))
    }

    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }

    /// Configured vendors, empty for `Skip`.
    pub fn vendors(&self) -> &[VendorId] {
        match self {
            Self::Skip => &[],
            Self::Ordered(vendors) => vendors,
        }
    }
}

/// Typed per-category defaults and per-method overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VendorConfig {
    pub categories: BTreeMap<MethodCategory, VendorChain>,
    pub methods: BTreeMap<DataMethod, VendorChain>,
}

impl VendorConfig {
    /// Method override if present, else the category default.
    pub fn resolve(&self, method: DataMethod) -> Option<&VendorChain> {
        self.methods
            .get(&method)
            .or_else(|| self.categories.get(&method.category()))
    }

    pub fn with_category(mut self, category: MethodCategory, chain: VendorChain) -> Self {
        self.categories.insert(category, chain);
        self
    }

    pub fn with_method(mut self, method: DataMethod, chain: VendorChain) -> Self {
        self.methods.insert(method, chain);
        self
    }

    /// Reject `skip` on any required method.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for method in DataMethod::ALL {
            if !method.is_optional() && self.resolve(method).is_some_and(VendorChain::is_skip) {
                return Err(ConfigError::SkipOnRequired { method });
            }
        }
        Ok(())
    }

    fn from_raw(
        categories: &BTreeMap<String, String>,
        methods: &BTreeMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for (name, value) in categories {
            let category: MethodCategory = name.parse()?;
            config
                .categories
                .insert(category, VendorChain::parse(name, value)?);
        }
        for (name, value) in methods {
            let method: DataMethod = name.parse()?;
            config.methods.insert(method, VendorChain::parse(name, value)?);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            backoff_factor: 2.0,
            max_delay_ms: 60_000,
            jitter: true,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub timeout_secs: u64,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_secs: 60,
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            open_timeout: Duration::from_secs(self.timeout_secs),
            success_threshold: self.success_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub realtime_ttl_secs: u64,
    pub eod_ttl_secs: u64,
    pub recent_window_days: u32,
    pub db_path: Option<PathBuf>,
    pub max_pool_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let policy = StalenessPolicy::default();
        Self {
            realtime_ttl_secs: policy.realtime_ttl_secs,
            eod_ttl_secs: policy.eod_ttl_secs,
            recent_window_days: policy.recent_window_days,
            db_path: None,
            max_pool_size: 4,
        }
    }
}

impl CacheSettings {
    pub fn staleness(&self) -> StalenessPolicy {
        StalenessPolicy {
            realtime_ttl_secs: self.realtime_ttl_secs,
            eod_ttl_secs: self.eod_ttl_secs,
            recent_window_days: self.recent_window_days,
        }
    }

    /// Warehouse location: explicit `db_path`, else under the tickwarden home.
    pub fn warehouse_config(&self) -> WarehouseConfig {
        let home = resolve_tickwarden_home();
        let db_path = self.db_path.clone().unwrap_or_else(|| default_db_path(&home));
        WarehouseConfig {
            home,
            db_path,
            max_pool_size: self.max_pool_size,
            staleness: self.staleness(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub utc_offset_hours: i8,
    pub open: String,
    pub close: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            utc_offset_hours: -5,
            open: String::from("09:30"),
            close: String::from("16:00"),
        }
    }
}

impl SessionSettings {
    pub fn session(&self) -> Result<MarketSession, ConfigError> {
        MarketSession::from_settings(self)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawDataConfig {
    category_defaults: BTreeMap<String, String>,
    method_overrides: BTreeMap<String, String>,
    runtime_provider: Option<String>,
    cache: CacheSettings,
    retry: RetrySettings,
    circuit_breaker: CircuitBreakerSettings,
    session: SessionSettings,
    http_timeout_ms: Option<u64>,
    alpha_vantage_api_key: Option<String>,
    local_data_dir: Option<PathBuf>,
}

/// Fully parsed configuration for the data layer.
#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub vendors: VendorConfig,
    pub runtime_provider: String,
    pub cache: CacheSettings,
    pub retry: RetrySettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub session: SessionSettings,
    pub http_timeout_ms: u64,
    pub alpha_vantage_api_key: Option<String>,
    pub local_data_dir: Option<PathBuf>,
}

pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RUNTIME_PROVIDER: &str = "openai";

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            vendors: default_vendor_config(),
            runtime_provider: String::from(DEFAULT_RUNTIME_PROVIDER),
            cache: CacheSettings::default(),
            retry: RetrySettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            session: SessionSettings::default(),
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            alpha_vantage_api_key: None,
            local_data_dir: None,
        }
    }
}

impl DataConfig {
    /// Parse JSON; unspecified categories keep their built-in defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let raw: RawDataConfig = serde_json::from_str(text)?;
        Self::from_raw(raw)
    }

    /// Load from `path`, else `$TICKWARDEN_CONFIG`, else built-in defaults.
    /// Environment API keys fill in keys the file leaves out.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os("TICKWARDEN_CONFIG").map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                Self::from_json(&text)?
            }
            None => Self::default(),
        };

        if config.alpha_vantage_api_key.is_none() {
            config.alpha_vantage_api_key = env::var("TICKWARDEN_ALPHA_VANTAGE_API_KEY")
                .or_else(|_| env::var("ALPHA_VANTAGE_API_KEY"))
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        Ok(config)
    }

    fn from_raw(raw: RawDataConfig) -> Result<Self, ConfigError> {
        let overrides = VendorConfig::from_raw(&raw.category_defaults, &raw.method_overrides)?;
        let mut vendors = default_vendor_config();
        vendors.categories.extend(overrides.categories);
        vendors.methods.extend(overrides.methods);
        vendors.validate()?;

        if raw.retry.backoff_factor < 1.0 || !raw.retry.backoff_factor.is_finite() {
            return Err(ConfigError::Invalid {
                field: "retry.backoff_factor",
                message: format!("must be a finite number >= 1.0, got {}", raw.retry.backoff_factor),
            });
        }
        if raw.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "circuit_breaker.failure_threshold",
                message: String::from("must be greater than zero"),
            });
        }
        raw.session.session()?;

        let runtime_provider = raw
            .runtime_provider
            .map(|provider| provider.trim().to_ascii_lowercase())
            .filter(|provider| !provider.is_empty())
            .unwrap_or_else(|| String::from(DEFAULT_RUNTIME_PROVIDER));

        Ok(Self {
            vendors,
            runtime_provider,
            cache: raw.cache,
            retry: raw.retry,
            circuit_breaker: raw.circuit_breaker,
            session: raw.session,
            http_timeout_ms: raw.http_timeout_ms.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS),
            alpha_vantage_api_key: raw.alpha_vantage_api_key,
            local_data_dir: raw.local_data_dir,
        })
    }

    /// Whether the runtime provider is locally hosted.
    pub fn runtime_is_local(&self) -> bool {
        is_local_runtime(&self.runtime_provider)
    }
}

pub fn is_local_runtime(provider: &str) -> bool {
    let provider = provider.trim().to_ascii_lowercase();
    LOCAL_RUNTIME_PROVIDERS.contains(&provider.as_str())
}

/// Built-in category defaults.
pub fn default_vendor_config() -> VendorConfig {
    let ordered = |ids: &[&str]| {
        VendorChain::Ordered(
            ids.iter()
                .filter_map(|id| VendorId::parse(id).ok())
                .collect(),
        )
    };
    VendorConfig::default()
        .with_category(MethodCategory::CoreStockApis, ordered(&["yfinance"]))
        .with_category(MethodCategory::TechnicalIndicators, ordered(&["alpha_vantage"]))
        .with_category(MethodCategory::FundamentalData, ordered(&["alpha_vantage"]))
        .with_category(MethodCategory::NewsData, ordered(&["alpha_vantage"]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<VendorId> {
        values
            .iter()
            .map(|value| VendorId::parse(value).expect("vendor id"))
            .collect()
    }

    #[test]
    fn chain_parsing_trims_and_dedupes() {
        let chain = VendorChain::parse("k", " YFinance , alpha_vantage,,yfinance ").expect("chain");
        assert_eq!(chain, VendorChain::Ordered(ids(&["yfinance", "alpha_vantage"])));
    }

    #[test]
    fn any_skip_token_means_skip() {
        assert_eq!(VendorChain::parse("k", "skip").expect("skip"), VendorChain::Skip);
        assert_eq!(VendorChain::parse("k", "local, SKIP").expect("skip"), VendorChain::Skip);
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert_eq!(
            VendorChain::parse("news_data", " , "),
            Err(ValidationError::EmptyVendorChain {
                key: String::from("news_data")
            })
        );
    }

    #[test]
    fn method_override_beats_category_default() {
        let config = DataConfig::from_json(
            r#"{
                "category_defaults": { "news_data": "local" },
                "method_overrides": { "get_global_news": "alpha_vantage,local" }
            }"#,
        )
        .expect("config");

        assert_eq!(
            config.vendors.resolve(DataMethod::GetNews),
            Some(&VendorChain::Ordered(ids(&["local"])))
        );
        assert_eq!(
            config.vendors.resolve(DataMethod::GetGlobalNews),
            Some(&VendorChain::Ordered(ids(&["alpha_vantage", "local"])))
        );
        assert_eq!(
            config.vendors.resolve(DataMethod::GetStockData),
            Some(&VendorChain::Ordered(ids(&["yfinance"])))
        );
    }

    #[test]
    fn skip_on_required_method_fails_to_load() {
        let error = DataConfig::from_json(r#"{ "method_overrides": { "get_stock_data": "skip" } }"#)
            .expect_err("must fail");
        assert!(matches!(
            error,
            ConfigError::SkipOnRequired {
                method: DataMethod::GetStockData
            }
        ));

        let error = DataConfig::from_json(r#"{ "category_defaults": { "core_stock_apis": "skip" } }"#)
            .expect_err("must fail");
        assert!(matches!(error, ConfigError::SkipOnRequired { .. }));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let error = DataConfig::from_json(r#"{ "method_overrides": { "get_weather": "local" } }"#)
            .expect_err("must fail");
        assert!(matches!(
            error,
            ConfigError::Validation(ValidationError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn defaults_fill_unspecified_sections() {
        let config = DataConfig::from_json(r#"{ "retry": { "max_retries": 5 } }"#).expect("config");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 1_000);
        assert_eq!(config.circuit_breaker, CircuitBreakerSettings::default());
        assert_eq!(config.cache.staleness(), StalenessPolicy::default());
        assert_eq!(config.http_timeout_ms, DEFAULT_HTTP_TIMEOUT_MS);
        assert!(!config.runtime_is_local());
    }

    #[test]
    fn local_runtimes_are_recognized() {
        assert!(is_local_runtime("Ollama"));
        assert!(is_local_runtime("llamacpp"));
        assert!(!is_local_runtime("anthropic"));
    }

    #[test]
    fn rejects_shrinking_backoff() {
        let error = DataConfig::from_json(r#"{ "retry": { "backoff_factor": 0.5 } }"#)
            .expect_err("must fail");
        assert!(matches!(error, ConfigError::Invalid { field: "retry.backoff_factor", .. }));
    }
}
