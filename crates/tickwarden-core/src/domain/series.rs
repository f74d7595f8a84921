//! Vendor-neutral price series and its CSV boundary format.
//!
//! Columns are `Date,Open,High,Low,Close,AdjClose,Volume`, rows ascending by
//! date. The header is written even for an empty series.

use std::collections::BTreeMap;

use serde::Serialize;
use tickwarden_warehouse::{PriceBar, PriceRecord};

use super::range::{parse_day, DateRange};
use crate::ValidationError;

pub const CSV_HEADER: [&str; 7] = ["Date", "Open", "High", "Low", "Close", "AdjClose", "Volume"];

/// Daily bars, unique by date and sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Sort by date; for duplicated dates the first occurrence wins.
    pub fn new(bars: Vec<PriceBar>) -> Self {
        let mut by_date = BTreeMap::new();
        for bar in bars {
            by_date.entry(bar.date).or_insert(bar);
        }
        Self {
            bars: by_date.into_values().collect(),
        }
    }

    pub fn from_records(records: &[PriceRecord]) -> Self {
        Self::new(records.iter().map(|record| record.bar.clone()).collect())
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bars dated inside `range`.
    pub fn within(self, range: DateRange) -> Self {
        Self {
            bars: self
                .bars
                .into_iter()
                .filter(|bar| range.contains(bar.date))
                .collect(),
        }
    }

    /// Union by date; bars already in `self` win over bars from `other`.
    pub fn merge(self, other: PriceSeries) -> Self {
        let mut bars = self.bars;
        bars.extend(other.bars);
        Self::new(bars)
    }

    pub fn to_csv(&self) -> Result<String, ValidationError> {
        let mut writer = csv::Writer::from_writer(vec![]);
        writer.write_record(CSV_HEADER).map_err(series_error)?;

        for bar in &self.bars {
            writer
                .write_record([
                    bar.date.to_string(),
                    format_value(bar.open),
                    format_value(bar.high),
                    format_value(bar.low),
                    format_value(bar.close),
                    format_value(bar.adj_close),
                    bar.volume.map(|volume| volume.to_string()).unwrap_or_default(),
                ])
                .map_err(series_error)?;
        }

        let data = writer.into_inner().map_err(|error| ValidationError::InvalidSeries {
            message: format!("failed to flush CSV writer: {error}"),
        })?;
        String::from_utf8(data).map_err(|error| ValidationError::InvalidSeries {
            message: format!("CSV output is not valid UTF-8: {error}"),
        })
    }

    /// Parse boundary CSV. Column lookup is by header name, so column order
    /// may vary and `Adj Close` is accepted for `AdjClose`. Blank, `null`
    /// and `NaN` cells read as missing.
    pub fn from_csv(text: &str) -> Result<Self, ValidationError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers().map_err(series_error)?.clone();
        let column = |names: &[&str]| {
            headers.iter().position(|header| {
                let header = header.to_ascii_lowercase().replace([' ', '_'], "");
                names.iter().any(|name| *name == header)
            })
        };
        let date_col = column(&["date"]).ok_or_else(|| ValidationError::InvalidSeries {
            message: String::from("missing Date column"),
        })?;
        let open_col = column(&["open"]);
        let high_col = column(&["high"]);
        let low_col = column(&["low"]);
        let close_col = column(&["close"]);
        let adj_col = column(&["adjclose"]);
        let volume_col = column(&["volume"]);

        let mut bars = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(series_error)?;
            let cell = |index: Option<usize>| index.and_then(|index| record.get(index));
            let date_text = record.get(date_col).unwrap_or_default();
            let date = parse_day(date_text.get(..10).unwrap_or(date_text))?;

            bars.push(PriceBar {
                date,
                open: parse_float(cell(open_col), line)?,
                high: parse_float(cell(high_col), line)?,
                low: parse_float(cell(low_col), line)?,
                close: parse_float(cell(close_col), line)?,
                adj_close: parse_float(cell(adj_col), line)?,
                volume: parse_volume(cell(volume_col), line)?,
            });
        }

        Ok(Self::new(bars))
    }
}

fn format_value(value: Option<f64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

fn is_missing(text: &str) -> bool {
    text.is_empty() || text.eq_ignore_ascii_case("null") || text.eq_ignore_ascii_case("nan")
}

fn parse_float(text: Option<&str>, line: usize) -> Result<Option<f64>, ValidationError> {
    match text {
        None => Ok(None),
        Some(text) if is_missing(text) => Ok(None),
        Some(text) => text
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ValidationError::InvalidSeries {
                message: format!("row {}: invalid number '{text}'", line + 1),
            }),
    }
}

fn parse_volume(text: Option<&str>, line: usize) -> Result<Option<i64>, ValidationError> {
    match text {
        None => Ok(None),
        Some(text) if is_missing(text) => Ok(None),
        Some(text) => text
            .parse::<i64>()
            .or_else(|_| text.parse::<f64>().map(|value| value.round() as i64))
            .map(Some)
            .map_err(|_| ValidationError::InvalidSeries {
                message: format!("row {}: invalid volume '{text}'", line + 1),
            }),
    }
}

fn series_error(error: csv::Error) -> ValidationError {
    ValidationError::InvalidSeries {
        message: error.to_string(),
    }
}
