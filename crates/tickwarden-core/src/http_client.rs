use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use crate::vendor::VendorError;

/// Outbound GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: 30_000,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok_json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Map a non-2xx status onto the vendor error taxonomy.
    pub fn status_error(&self, vendor: &str) -> Option<VendorError> {
        if self.is_success() {
            return None;
        }
        let message = format!("{vendor} responded with HTTP {}", self.status);
        Some(match self.status {
            429 => VendorError::rate_limited(message),
            404 => VendorError::not_found(message),
            _ => VendorError::unavailable(message),
        })
    }
}

/// Transport-level HTTP error (connect failure, timeout, body read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    timed_out: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn timed_out(&self) -> bool {
        self.timed_out
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

impl From<HttpError> for VendorError {
    fn from(error: HttpError) -> Self {
        VendorError::unavailable(error.message)
    }
}

/// Blocking transport used by the HTTP vendors.
pub trait HttpClient: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Production HTTP client backed by `reqwest::blocking`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::blocking::Client>,
}

impl ReqwestHttpClient {
    /// Client whose requests time out after `timeout_ms` unless a request sets its own.
    pub fn new(timeout_ms: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("tickwarden/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(timeout_ms.max(1)))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            client: Arc::new(client),
        }
    }

    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self
            .client
            .get(&request.url)
            .timeout(Duration::from_millis(request.timeout_ms.max(1)));
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().map_err(|error| {
            if error.is_timeout() {
                HttpError::timeout(format!("request timed out: {error}"))
            } else {
                HttpError::new(format!("request failed: {error}"))
            }
        })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|error| HttpError::new(format!("failed to read response body: {error}")))?;
        Ok(HttpResponse { status, body })
    }
}
