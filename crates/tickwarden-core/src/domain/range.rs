use std::fmt::{Display, Formatter};

use serde::Serialize;
use time::{Date, Duration};
use tickwarden_warehouse::dates::{self, serde_date};

use crate::ValidationError;

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    #[serde(with = "serde_date")]
    start: Date,
    #[serde(with = "serde_date")]
    end: Date,
}

impl DateRange {
    pub fn new(start: Date, end: Date) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self, ValidationError> {
        Self::new(parse_day(start)?, parse_day(end)?)
    }

    /// The `days` calendar days ending at `end`, inclusive.
    pub fn trailing(end: Date, days: u32) -> Self {
        let start = end - Duration::days(i64::from(days.saturating_sub(1)));
        Self { start, end }
    }

    pub const fn start(&self) -> Date {
        self.start
    }

    pub const fn end(&self) -> Date {
        self.end
    }

    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

pub(crate) fn parse_day(value: &str) -> Result<Date, ValidationError> {
    dates::parse_date(value).map_err(|_| ValidationError::InvalidDate {
        value: value.to_string(),
    })
}
