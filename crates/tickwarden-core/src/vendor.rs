//! Vendor contract, payloads, and the per-method registry.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{DataMethod, DateRange, PriceSeries, Symbol};
use crate::ValidationError;

/// Normalized vendor identifier (`yfinance`, `alpha_vantage`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VendorId(String);

impl VendorId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let normalized = input.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::EmptyVendorId);
        }
        let valid = normalized
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !valid {
            return Err(ValidationError::InvalidVendorId { value: normalized });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VendorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for VendorId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VendorId> for String {
    fn from(value: VendorId) -> Self {
        value.0
    }
}

/// Vendor failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorErrorKind {
    Unsupported,
    RateLimited,
    Unavailable,
    InvalidResponse,
    NotFound,
    CircuitOpen,
    Internal,
}

/// Structured error returned by a vendor implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorError {
    kind: VendorErrorKind,
    message: String,
    retryable: bool,
}

impl VendorError {
    pub fn unsupported(vendor: &VendorId, method: DataMethod) -> Self {
        Self {
            kind: VendorErrorKind::Unsupported,
            message: format!("vendor '{vendor}' does not implement '{method}'"),
            retryable: false,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: VendorErrorKind::RateLimited,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: VendorErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: VendorErrorKind::InvalidResponse,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: VendorErrorKind::NotFound,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn circuit_open(vendor: &VendorId) -> Self {
        Self {
            kind: VendorErrorKind::CircuitOpen,
            message: format!("circuit for vendor '{vendor}' is open"),
            retryable: false,
        }
    }

    /// Vendor has no coverage for this kind of instrument.
    pub fn unsupported_symbol(vendor: &VendorId, symbol: &Symbol) -> Self {
        Self {
            kind: VendorErrorKind::Unsupported,
            message: format!(
                "vendor '{vendor}' does not cover {:?} symbol '{symbol}'",
                symbol.kind()
            ),
            retryable: false,
        }
    }

    /// Vendor needs a credential that is not configured.
    pub fn missing_credentials(vendor: &VendorId) -> Self {
        Self {
            kind: VendorErrorKind::Unsupported,
            message: format!("vendor '{vendor}' has no API key configured"),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: VendorErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> VendorErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            VendorErrorKind::Unsupported => "vendor.unsupported",
            VendorErrorKind::RateLimited => "vendor.rate_limited",
            VendorErrorKind::Unavailable => "vendor.unavailable",
            VendorErrorKind::InvalidResponse => "vendor.invalid_response",
            VendorErrorKind::NotFound => "vendor.not_found",
            VendorErrorKind::CircuitOpen => "vendor.circuit_open",
            VendorErrorKind::Internal => "vendor.internal",
        }
    }
}

impl Display for VendorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for VendorError {}

/// One routed request as seen by a vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorRequest {
    pub method: DataMethod,
    pub symbol: Option<Symbol>,
    pub range: Option<DateRange>,
    /// Method-specific extras such as `indicator` or `limit`.
    pub params: BTreeMap<String, String>,
}

impl VendorRequest {
    pub fn new(method: DataMethod) -> Self {
        Self {
            method,
            symbol: None,
            range: None,
            params: BTreeMap::new(),
        }
    }

    pub fn prices(symbol: Symbol, range: DateRange) -> Self {
        Self::new(DataMethod::GetStockData)
            .with_symbol(symbol)
            .with_range(range)
    }

    pub fn with_symbol(mut self, symbol: Symbol) -> Self {
        self.symbol = Some(symbol);
        self
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Symbol, or a `MissingSymbol` validation error for the request's method.
    pub fn require_symbol(&self) -> Result<&Symbol, ValidationError> {
        self.symbol
            .as_ref()
            .ok_or(ValidationError::MissingSymbol {
                method: self.method,
            })
    }

    pub fn require_range(&self) -> Result<DateRange, ValidationError> {
        self.range.ok_or(ValidationError::MissingDateRange {
            method: self.method,
        })
    }
}

/// Data returned by a vendor.
#[derive(Debug, Clone, PartialEq)]
pub enum VendorPayload {
    Prices(PriceSeries),
    Text(String),
}

impl VendorPayload {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Prices(_) => "prices",
            Self::Text(_) => "text",
        }
    }

    /// Combine results from several vendors or sub-sources.
    ///
    /// Price series merge by date with earlier parts winning. Text parts are
    /// joined with a blank line. A mix renders prices as CSV before joining.
    pub fn aggregate(parts: Vec<VendorPayload>) -> Option<VendorPayload> {
        let mut parts = parts.into_iter();
        let first = parts.next()?;
        Some(parts.fold(first, |combined, next| match (combined, next) {
            (Self::Prices(left), Self::Prices(right)) => Self::Prices(left.merge(right)),
            (left, right) => Self::Text(format!("{}\n\n{}", left.render(), right.render())),
        }))
    }

    /// Textual form; prices render in the CSV boundary format.
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Prices(series) => series
                .to_csv()
                .unwrap_or_else(|error| format!("<unrenderable price series: {error}>")),
        }
    }
}

/// A single vendor's implementation of one or more methods.
pub trait VendorImplementation: Send + Sync {
    fn fetch(&self, request: &VendorRequest) -> Result<VendorPayload, VendorError>;
}

impl<F> VendorImplementation for F
where
    F: Fn(&VendorRequest) -> Result<VendorPayload, VendorError> + Send + Sync,
{
    fn fetch(&self, request: &VendorRequest) -> Result<VendorPayload, VendorError> {
        self(request)
    }
}

/// How a vendor serves one method: one implementation, or several
/// sub-sources that are all invoked and aggregated.
#[derive(Clone)]
pub enum VendorBinding {
    Single(Arc<dyn VendorImplementation>),
    Multi(Vec<Arc<dyn VendorImplementation>>),
}

impl VendorBinding {
    pub fn implementations(&self) -> Vec<Arc<dyn VendorImplementation>> {
        match self {
            Self::Single(implementation) => vec![Arc::clone(implementation)],
            Self::Multi(implementations) => implementations.clone(),
        }
    }
}

impl std::fmt::Debug for VendorBinding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(_) => f.write_str("Single"),
            Self::Multi(implementations) => write!(f, "Multi({})", implementations.len()),
        }
    }
}

/// Registered vendors per method, in registration order.
#[derive(Debug, Clone, Default)]
pub struct VendorRegistry {
    methods: HashMap<DataMethod, Vec<(VendorId, VendorBinding)>>,
    hosted_only: HashSet<VendorId>,
}

impl VendorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `binding` for `(method, vendor)`. Re-registering replaces the
    /// binding but keeps the vendor's original position.
    pub fn register(&mut self, method: DataMethod, vendor: VendorId, binding: VendorBinding) {
        let entries = self.methods.entry(method).or_default();
        match entries.iter_mut().find(|(existing, _)| *existing == vendor) {
            Some(entry) => entry.1 = binding,
            None => entries.push((vendor, binding)),
        }
    }

    pub fn register_single(
        &mut self,
        method: DataMethod,
        vendor: VendorId,
        implementation: Arc<dyn VendorImplementation>,
    ) {
        self.register(method, vendor, VendorBinding::Single(implementation));
    }

    /// Flag a vendor that only works when a hosted (non-local) runtime
    /// provides its credentials.
    pub fn mark_requires_hosted_runtime(&mut self, vendor: VendorId) {
        self.hosted_only.insert(vendor);
    }

    pub fn requires_hosted_runtime(&self, vendor: &VendorId) -> bool {
        self.hosted_only.contains(vendor)
    }

    pub fn vendors_for(&self, method: DataMethod) -> Vec<VendorId> {
        self.methods
            .get(&method)
            .map(|entries| entries.iter().map(|(vendor, _)| vendor.clone()).collect())
            .unwrap_or_default()
    }

    pub fn binding(&self, method: DataMethod, vendor: &VendorId) -> Option<&VendorBinding> {
        self.methods
            .get(&method)?
            .iter()
            .find(|(existing, _)| existing == vendor)
            .map(|(_, binding)| binding)
    }
}
