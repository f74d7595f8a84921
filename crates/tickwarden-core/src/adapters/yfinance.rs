use std::sync::Arc;

use serde::Deserialize;
use time::{Date, Duration, OffsetDateTime, Time};
use tickwarden_warehouse::PriceBar;

use crate::domain::{DataMethod, DateRange, PriceSeries};
use crate::http_client::{HttpClient, HttpRequest};
use crate::throttling::VendorThrottle;
use crate::vendor::{VendorError, VendorId, VendorImplementation, VendorPayload, VendorRequest};

use super::YFINANCE;

const CHART_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const REQUESTS_PER_MINUTE: u32 = 120;

/// Daily bars from the Yahoo Finance chart endpoint.
pub struct YFinanceVendor {
    id: VendorId,
    http: Arc<dyn HttpClient>,
    throttle: VendorThrottle,
    base_url: String,
    timeout_ms: u64,
}

impl YFinanceVendor {
    pub fn new(http: Arc<dyn HttpClient>, timeout_ms: u64) -> Result<Self, VendorError> {
        let id = VendorId::parse(YFINANCE).map_err(|error| VendorError::internal(error.to_string()))?;
        Ok(Self {
            throttle: VendorThrottle::per_minute(id.clone(), REQUESTS_PER_MINUTE),
            id,
            http,
            base_url: String::from(CHART_BASE_URL),
            timeout_ms,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn fetch_prices(&self, request: &VendorRequest) -> Result<PriceSeries, VendorError> {
        let symbol = request
            .require_symbol()
            .map_err(|error| VendorError::internal(error.to_string()))?;
        let range = request
            .require_range()
            .map_err(|error| VendorError::internal(error.to_string()))?;

        self.throttle.acquire()?;

        let (period1, period2) = unix_bounds(range);
        let url = format!(
            "{}/{}?period1={period1}&period2={period2}&interval=1d&events=div%2Csplit&includeAdjustedClose=true",
            self.base_url,
            urlencoding::encode(symbol.as_str()),
        );
        let response = self
            .http
            .execute(HttpRequest::get(url).with_timeout_ms(self.timeout_ms))?;

        // Yahoo reports unknown symbols as a 404 carrying a chart error body.
        if response.status != 404 {
            if let Some(error) = response.status_error(self.id.as_str()) {
                return Err(error);
            }
        }

        let parsed: ChartResponse = match serde_json::from_str(&response.body) {
            Ok(parsed) => parsed,
            Err(error) => {
                return Err(response.status_error(self.id.as_str()).unwrap_or_else(|| {
                    VendorError::invalid_response(format!("failed to parse yahoo chart: {error}"))
                }))
            }
        };
        parse_chart(parsed, range)
    }
}

impl VendorImplementation for YFinanceVendor {
    fn fetch(&self, request: &VendorRequest) -> Result<VendorPayload, VendorError> {
        match request.method {
            DataMethod::GetStockData => self.fetch_prices(request).map(VendorPayload::Prices),
            other => Err(VendorError::unsupported(&self.id, other)),
        }
    }
}

/// `period1` is midnight UTC of the first day, `period2` midnight after the last.
fn unix_bounds(range: DateRange) -> (i64, i64) {
    let start = range.start().with_time(Time::MIDNIGHT).assume_utc();
    let end = (range.end() + Duration::days(1))
        .with_time(Time::MIDNIGHT)
        .assume_utc();
    (start.unix_timestamp(), end.unix_timestamp())
}

fn parse_chart(response: ChartResponse, range: DateRange) -> Result<PriceSeries, VendorError> {
    if let Some(error) = response.chart.error {
        let message = format!(
            "yahoo chart error {}: {}",
            error.code,
            error.description.unwrap_or_default()
        );
        return Err(if error.code == "Not Found" {
            VendorError::not_found(message)
        } else {
            VendorError::invalid_response(message)
        });
    }

    let Some(result) = response.chart.result.and_then(|results| results.into_iter().next()) else {
        return Err(VendorError::invalid_response("yahoo chart response has no result"));
    };

    let offset = result.meta.and_then(|meta| meta.gmtoffset).unwrap_or(0);
    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .and_then(|series| series.into_iter().next())
        .map(|series| series.adjclose)
        .unwrap_or_default();

    let mut bars = Vec::with_capacity(timestamps.len());
    for (index, timestamp) in timestamps.into_iter().enumerate() {
        let value = |column: &[Option<f64>]| column.get(index).copied().flatten();
        let bar = PriceBar {
            date: exchange_date(timestamp, offset)?,
            open: value(&quote.open),
            high: value(&quote.high),
            low: value(&quote.low),
            close: value(&quote.close),
            adj_close: value(&adjclose),
            volume: quote.volume.get(index).copied().flatten(),
        };

        // Halted or placeholder sessions come back with every field null.
        let empty = bar.open.is_none()
            && bar.high.is_none()
            && bar.low.is_none()
            && bar.close.is_none()
            && bar.volume.is_none();
        if !empty && range.contains(bar.date) {
            bars.push(bar);
        }
    }

    Ok(PriceSeries::new(bars))
}

fn exchange_date(timestamp: i64, gmtoffset: i64) -> Result<Date, VendorError> {
    OffsetDateTime::from_unix_timestamp(timestamp.saturating_add(gmtoffset))
        .map(|instant| instant.date())
        .map_err(|error| VendorError::invalid_response(format!("invalid timestamp {timestamp}: {error}")))
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
    #[serde(default)]
    adjclose: Option<Vec<ChartAdjClose>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct ChartAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}
