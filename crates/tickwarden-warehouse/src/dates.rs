//! Text encodings for dates and timestamps crossing the SQL and serde boundaries.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::WarehouseError;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]");

/// `YYYY-MM-DD`.
pub fn format_date(date: Date) -> Result<String, WarehouseError> {
    date.format(DATE_FORMAT)
        .map_err(|error| WarehouseError::InvalidData(format!("cannot format date: {error}")))
}

pub fn parse_date(value: &str) -> Result<Date, WarehouseError> {
    Date::parse(value.trim(), DATE_FORMAT).map_err(|error| {
        WarehouseError::InvalidData(format!("invalid date '{value}': {error}"))
    })
}

/// UTC wall-clock text accepted by `CAST(? AS TIMESTAMP)`.
pub fn format_timestamp(instant: OffsetDateTime) -> Result<String, WarehouseError> {
    instant
        .to_offset(UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .map_err(|error| WarehouseError::InvalidData(format!("cannot format timestamp: {error}")))
}

/// Inverse of `epoch_us(ts)` for timestamps stored in UTC.
pub fn timestamp_from_micros(micros: i64) -> Result<OffsetDateTime, WarehouseError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000).map_err(|error| {
        WarehouseError::InvalidData(format!("timestamp out of range ({micros}us): {error}"))
    })
}

/// Serde adapter writing dates as `YYYY-MM-DD`.
pub mod serde_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    use super::DATE_FORMAT;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let text = date.format(DATE_FORMAT).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let text = String::deserialize(deserializer)?;
        Date::parse(text.trim(), DATE_FORMAT).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Date;

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(
            date: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Date>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|text| {
                    Date::parse(text.trim(), super::super::DATE_FORMAT)
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}
