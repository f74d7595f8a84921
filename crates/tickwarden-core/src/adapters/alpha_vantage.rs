use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tickwarden_warehouse::PriceBar;

use crate::domain::{DataMethod, DateRange, PriceSeries, SymbolKind};
use crate::http_client::{HttpClient, HttpRequest};
use crate::throttling::VendorThrottle;
use crate::vendor::{VendorError, VendorId, VendorImplementation, VendorPayload, VendorRequest};

use super::ALPHA_VANTAGE;

const QUERY_URL: &str = "https://www.alphavantage.co/query";
/// Free-tier allowance.
const REQUESTS_PER_MINUTE: u32 = 5;
const DEFAULT_INDICATOR: &str = "SMA";
const DEFAULT_TIME_PERIOD: &str = "14";
const DEFAULT_NEWS_LIMIT: &str = "50";

/// Alpha Vantage `query` API: daily prices, fundamentals, news, indicators
/// and insider transactions.
pub struct AlphaVantageVendor {
    id: VendorId,
    http: Arc<dyn HttpClient>,
    api_key: Option<String>,
    throttle: VendorThrottle,
    base_url: String,
    timeout_ms: u64,
}

impl AlphaVantageVendor {
    pub fn new(
        http: Arc<dyn HttpClient>,
        api_key: Option<String>,
        timeout_ms: u64,
    ) -> Result<Self, VendorError> {
        let id = VendorId::parse(ALPHA_VANTAGE)
            .map_err(|error| VendorError::internal(error.to_string()))?;
        Ok(Self {
            throttle: VendorThrottle::per_minute(id.clone(), REQUESTS_PER_MINUTE),
            id,
            http,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: String::from(QUERY_URL),
            timeout_ms,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_throttle(mut self, throttle: VendorThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Query parameters for `request`, without the API key.
    fn query_for(&self, request: &VendorRequest) -> Result<Vec<(&'static str, String)>, VendorError> {
        let symbol = || {
            let symbol = request
                .require_symbol()
                .map_err(|error| VendorError::internal(error.to_string()))?;
            if symbol.kind() == SymbolKind::Index {
                return Err(VendorError::unsupported_symbol(&self.id, symbol));
            }
            Ok(symbol.as_str().to_string())
        };

        let query = match request.method {
            DataMethod::GetStockData => vec![
                ("function", String::from("TIME_SERIES_DAILY_ADJUSTED")),
                ("symbol", symbol()?),
                ("outputsize", String::from("full")),
            ],
            DataMethod::GetFundamentals => {
                vec![("function", String::from("OVERVIEW")), ("symbol", symbol()?)]
            }
            DataMethod::GetBalanceSheet => vec![
                ("function", String::from("BALANCE_SHEET")),
                ("symbol", symbol()?),
            ],
            DataMethod::GetCashflow => {
                vec![("function", String::from("CASH_FLOW")), ("symbol", symbol()?)]
            }
            DataMethod::GetIncomeStatement => vec![
                ("function", String::from("INCOME_STATEMENT")),
                ("symbol", symbol()?),
            ],
            DataMethod::GetIndicators => vec![
                (
                    "function",
                    request
                        .param("indicator")
                        .unwrap_or(DEFAULT_INDICATOR)
                        .to_ascii_uppercase(),
                ),
                ("symbol", symbol()?),
                ("interval", String::from("daily")),
                (
                    "time_period",
                    request
                        .param("time_period")
                        .unwrap_or(DEFAULT_TIME_PERIOD)
                        .to_string(),
                ),
                ("series_type", String::from("close")),
            ],
            DataMethod::GetNews | DataMethod::GetGlobalNews => {
                let mut query = vec![("function", String::from("NEWS_SENTIMENT"))];
                if request.method == DataMethod::GetNews {
                    query.push(("tickers", symbol()?));
                } else {
                    query.push(("topics", String::from("financial_markets")));
                }
                if let Some(range) = request.range {
                    query.push(("time_from", news_bound(range.start(), "0000")));
                    query.push(("time_to", news_bound(range.end(), "2359")));
                }
                query.push((
                    "limit",
                    request.param("limit").unwrap_or(DEFAULT_NEWS_LIMIT).to_string(),
                ));
                query
            }
            DataMethod::GetInsiderTransactions => vec![
                ("function", String::from("INSIDER_TRANSACTIONS")),
                ("symbol", symbol()?),
            ],
            DataMethod::GetInsiderSentiment => {
                return Err(VendorError::unsupported(&self.id, request.method))
            }
        };
        Ok(query)
    }

    fn url(&self, query: &[(&'static str, String)], api_key: &str) -> String {
        let mut url = format!("{}?", self.base_url);
        for (name, value) in query {
            let _ = write!(url, "{name}={}&", urlencoding::encode(value));
        }
        let _ = write!(url, "apikey={}", urlencoding::encode(api_key));
        url
    }

    fn call(&self, request: &VendorRequest) -> Result<Value, VendorError> {
        let query = self.query_for(request)?;
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(VendorError::missing_credentials(&self.id));
        };
        self.throttle.acquire()?;

        let response = self.http.execute(
            HttpRequest::get(self.url(&query, api_key)).with_timeout_ms(self.timeout_ms),
        )?;
        if let Some(error) = response.status_error(self.id.as_str()) {
            return Err(error);
        }

        let body: Value = serde_json::from_str(&response.body).map_err(|error| {
            VendorError::invalid_response(format!("failed to parse alpha vantage response: {error}"))
        })?;
        check_body(&body)?;
        Ok(body)
    }
}

impl VendorImplementation for AlphaVantageVendor {
    fn fetch(&self, request: &VendorRequest) -> Result<VendorPayload, VendorError> {
        let body = self.call(request)?;
        match request.method {
            DataMethod::GetStockData => {
                let range = request
                    .require_range()
                    .map_err(|error| VendorError::internal(error.to_string()))?;
                parse_daily_adjusted(body, range).map(VendorPayload::Prices)
            }
            DataMethod::GetNews | DataMethod::GetGlobalNews => {
                Ok(VendorPayload::Text(render_news(&body)?))
            }
            _ => serde_json::to_string_pretty(&body)
                .map(VendorPayload::Text)
                .map_err(|error| VendorError::internal(error.to_string())),
        }
    }
}

/// Alpha Vantage answers throttled and invalid calls with HTTP 200 and an
/// explanatory field instead of data.
fn check_body(body: &Value) -> Result<(), VendorError> {
    if let Some(message) = body.get("Error Message").and_then(Value::as_str) {
        return Err(VendorError::not_found(message.to_string()));
    }
    for field in ["Note", "Information"] {
        if let Some(message) = body.get(field).and_then(Value::as_str) {
            return Err(if is_rate_limit_message(message) {
                VendorError::rate_limited(message.to_string())
            } else {
                VendorError::invalid_response(message.to_string())
            });
        }
    }
    Ok(())
}

fn is_rate_limit_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("rate limit") || message.contains("call frequency")
}

fn news_bound(date: time::Date, clock: &str) -> String {
    format!(
        "{:04}{:02}{:02}T{clock}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "1. open")]
    open: Option<String>,
    #[serde(rename = "2. high")]
    high: Option<String>,
    #[serde(rename = "3. low")]
    low: Option<String>,
    #[serde(rename = "4. close")]
    close: Option<String>,
    #[serde(rename = "5. adjusted close")]
    adjusted_close: Option<String>,
    #[serde(rename = "6. volume")]
    volume: Option<String>,
}

fn parse_daily_adjusted(body: Value, range: DateRange) -> Result<PriceSeries, VendorError> {
    let Value::Object(mut fields) = body else {
        return Err(VendorError::invalid_response("alpha vantage body is not an object"));
    };
    let key = fields
        .keys()
        .find(|key| key.starts_with("Time Series"))
        .cloned()
        .ok_or_else(|| VendorError::invalid_response("no time series in alpha vantage response"))?;
    let series = fields.remove(&key).unwrap_or(Value::Null);
    let rows: BTreeMap<String, DailyBar> = serde_json::from_value(series).map_err(|error| {
        VendorError::invalid_response(format!("malformed alpha vantage time series: {error}"))
    })?;

    let number = |value: &Option<String>| value.as_deref().and_then(|raw| raw.trim().parse::<f64>().ok());
    let mut bars = Vec::new();
    for (day, row) in rows {
        let date = tickwarden_warehouse::dates::parse_date(&day)
            .map_err(|error| VendorError::invalid_response(error.to_string()))?;
        if !range.contains(date) {
            continue;
        }
        bars.push(PriceBar {
            date,
            open: number(&row.open),
            high: number(&row.high),
            low: number(&row.low),
            close: number(&row.close),
            adj_close: number(&row.adjusted_close),
            volume: row
                .volume
                .as_deref()
                .and_then(|raw| raw.trim().parse::<i64>().ok()),
        });
    }
    Ok(PriceSeries::new(bars))
}

fn render_news(body: &Value) -> Result<String, VendorError> {
    let feed = body
        .get("feed")
        .and_then(Value::as_array)
        .ok_or_else(|| VendorError::invalid_response("news response has no feed"))?;

    let field = |item: &Value, name: &str| {
        item.get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string()
    };
    let articles: Vec<String> = feed
        .iter()
        .map(|item| {
            format!(
                "### {} (source: {}, published: {})\n{}",
                field(item, "title"),
                field(item, "source"),
                field(item, "time_published"),
                field(item, "summary")
            )
        })
        .collect();
    Ok(articles.join("\n\n"))
}
