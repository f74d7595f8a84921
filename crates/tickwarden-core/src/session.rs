//! Exchange trading-session window used to classify rows as realtime.

use time::macros::format_description;
use time::{Date, OffsetDateTime, Time, UtcOffset, Weekday};

use crate::config::SessionSettings;
use crate::error::ConfigError;

/// Regular trading hours at a fixed UTC offset, Monday to Friday.
/// Exchange holidays are not modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketSession {
    offset: UtcOffset,
    open: Time,
    close: Time,
}

impl Default for MarketSession {
    fn default() -> Self {
        Self {
            offset: UtcOffset::from_hms(-5, 0, 0).unwrap_or(UtcOffset::UTC),
            open: Time::from_hms(9, 30, 0).unwrap_or(Time::MIDNIGHT),
            close: Time::from_hms(16, 0, 0).unwrap_or(Time::MIDNIGHT),
        }
    }
}

impl MarketSession {
    pub fn new(offset: UtcOffset, open: Time, close: Time) -> Result<Self, ConfigError> {
        if open >= close {
            return Err(ConfigError::Invalid {
                field: "session",
                message: format!("open {open} must be before close {close}"),
            });
        }
        Ok(Self {
            offset,
            open,
            close,
        })
    }

    pub fn from_settings(settings: &SessionSettings) -> Result<Self, ConfigError> {
        let offset = UtcOffset::from_hms(settings.utc_offset_hours, 0, 0).map_err(|error| {
            ConfigError::Invalid {
                field: "session.utc_offset_hours",
                message: error.to_string(),
            }
        })?;
        Self::new(
            offset,
            parse_clock("session.open", &settings.open)?,
            parse_clock("session.close", &settings.close)?,
        )
    }

    /// Calendar date at the exchange for `now`.
    pub fn session_date(&self, now: OffsetDateTime) -> Date {
        now.to_offset(self.offset).date()
    }

    pub fn is_open(&self, now: OffsetDateTime) -> bool {
        let local = now.to_offset(self.offset);
        let weekday = !matches!(local.weekday(), Weekday::Saturday | Weekday::Sunday);
        weekday && self.open <= local.time() && local.time() < self.close
    }

    /// A bar is realtime when it belongs to today's session and the session
    /// has not closed yet.
    pub fn is_realtime(&self, date: Date, now: OffsetDateTime) -> bool {
        date == self.session_date(now) && self.is_open(now)
    }
}

fn parse_clock(field: &'static str, value: &str) -> Result<Time, ConfigError> {
    Time::parse(value.trim(), format_description!("[hour]:[minute]")).map_err(|error| {
        ConfigError::Invalid {
            field,
            message: format!("'{value}' is not HH:MM ({error})"),
        }
    })
}
