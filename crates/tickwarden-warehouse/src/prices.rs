//! Persistent OHLCV cache keyed by `(instrument_id, price_date)`.

use std::collections::BTreeMap;
use std::sync::Arc;

use ::duckdb::{params, ToSql};
use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};

use crate::clock::Clock;
use crate::dates::{self, serde_date};
use crate::duckdb::DuckDbConnectionManager;
use crate::staleness::StalenessPolicy;
use crate::WarehouseError;

const UPSERT_PRICE_SQL: &str = r#"
INSERT INTO price_cache (
    instrument_id, price_date, open, high, low, close, adj_close, volume,
    data_source, fetched_at, is_realtime
)
VALUES (?, CAST(? AS DATE), ?, ?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP), ?)
ON CONFLICT (instrument_id, price_date) DO UPDATE SET
    open = excluded.open,
    high = excluded.high,
    low = excluded.low,
    close = excluded.close,
    adj_close = excluded.adj_close,
    volume = excluded.volume,
    data_source = excluded.data_source,
    fetched_at = excluded.fetched_at,
    is_realtime = excluded.is_realtime
"#;

/// One vendor-neutral OHLCV observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    #[serde(with = "serde_date")]
    pub date: Date,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<i64>,
}

impl PriceBar {
    /// A bar carrying only a date; values are filled in by the caller.
    #[must_use]
    pub fn empty(date: Date) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close: None,
            adj_close: None,
            volume: None,
        }
    }
}

/// A cached row, including provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRecord {
    pub instrument_id: i64,
    #[serde(flatten)]
    pub bar: PriceBar,
    pub data_source: String,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
    pub is_realtime: bool,
}

/// Row counts removed by [`PriceCacheStore::cleanup_stale_cache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub realtime_deleted: usize,
    pub eod_deleted: usize,
    pub total_deleted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_records: u64,
    pub unique_instruments: u64,
    #[serde(with = "serde_date::option")]
    pub oldest_date: Option<Date>,
    #[serde(with = "serde_date::option")]
    pub newest_date: Option<Date>,
    pub realtime_count: u64,
    pub by_source: BTreeMap<String, u64>,
}

struct RawPriceRow {
    instrument_id: i64,
    price_date: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    adj_close: Option<f64>,
    volume: Option<i64>,
    data_source: String,
    fetched_at_us: i64,
    is_realtime: bool,
}

impl RawPriceRow {
    fn into_record(self) -> Result<PriceRecord, WarehouseError> {
        Ok(PriceRecord {
            instrument_id: self.instrument_id,
            bar: PriceBar {
                date: dates::parse_date(&self.price_date)?,
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
                adj_close: self.adj_close,
                volume: self.volume,
            },
            data_source: self.data_source,
            fetched_at: dates::timestamp_from_micros(self.fetched_at_us)?,
            is_realtime: self.is_realtime,
        })
    }
}

/// Cache-aside store for daily price rows with tiered staleness.
///
/// Every write is a single-row upsert; there is no transaction spanning
/// multiple rows and no application-level locking.
#[derive(Clone)]
pub struct PriceCacheStore {
    manager: DuckDbConnectionManager,
    clock: Arc<dyn Clock>,
    policy: StalenessPolicy,
}

impl PriceCacheStore {
    pub(crate) fn new(
        manager: DuckDbConnectionManager,
        clock: Arc<dyn Clock>,
        policy: StalenessPolicy,
    ) -> Self {
        Self {
            manager,
            clock,
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> StalenessPolicy {
        self.policy
    }

    /// Cached rows for the inclusive range, or `None` on a miss.
    ///
    /// A range with no rows, or with any stale row, is a miss. Missing dates
    /// inside an otherwise fresh range are not detected.
    pub fn get_cached_prices(
        &self,
        instrument_id: i64,
        start: Date,
        end: Date,
    ) -> Result<Option<Vec<PriceRecord>>, WarehouseError> {
        let start_text = dates::format_date(start)?;
        let end_text = dates::format_date(end)?;

        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            r#"
SELECT
    instrument_id,
    CAST(price_date AS VARCHAR),
    open, high, low, close, adj_close, volume,
    data_source,
    epoch_us(fetched_at),
    is_realtime
FROM price_cache
WHERE instrument_id = ?
  AND price_date BETWEEN CAST(? AS DATE) AND CAST(? AS DATE)
ORDER BY price_date ASC
"#,
        )?;
        let rows = statement.query_map(params![instrument_id, start_text, end_text], |row| {
            Ok(RawPriceRow {
                instrument_id: row.get(0)?,
                price_date: row.get(1)?,
                open: row.get(2)?,
                high: row.get(3)?,
                low: row.get(4)?,
                close: row.get(5)?,
                adj_close: row.get(6)?,
                volume: row.get(7)?,
                data_source: row.get(8)?,
                fetched_at_us: row.get(9)?,
                is_realtime: row.get(10)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }

        if records.is_empty() {
            return Ok(None);
        }

        let now = self.clock.now();
        let stale = records.iter().find(|record| {
            self.policy
                .is_stale(record.bar.date, record.fetched_at, record.is_realtime, now)
        });
        if let Some(stale) = stale {
            tracing::debug!(
                instrument_id,
                price_date = %stale.bar.date,
                is_realtime = stale.is_realtime,
                "cached range contains a stale row"
            );
            return Ok(None);
        }

        Ok(Some(records))
    }

    /// Upsert `bars` for one instrument. Rows that fail are logged and skipped;
    /// the return value counts rows written.
    pub fn store_prices(
        &self,
        instrument_id: i64,
        bars: &[PriceBar],
        data_source: &str,
        is_realtime: bool,
    ) -> Result<usize, WarehouseError> {
        if bars.is_empty() {
            return Ok(0);
        }

        let fetched_at = dates::format_timestamp(self.clock.now())?;
        let connection = self.manager.acquire()?;

        let mut stored = 0;
        for bar in bars {
            let result = dates::format_date(bar.date).and_then(|price_date| {
                let params: [&dyn ToSql; 11] = [
                    &instrument_id,
                    &price_date,
                    &bar.open,
                    &bar.high,
                    &bar.low,
                    &bar.close,
                    &bar.adj_close,
                    &bar.volume,
                    &data_source,
                    &fetched_at,
                    &is_realtime,
                ];
                connection
                    .execute(UPSERT_PRICE_SQL, params.as_slice())
                    .map_err(WarehouseError::from)
            });

            match result {
                Ok(_) => stored += 1,
                Err(error) => tracing::warn!(
                    instrument_id,
                    price_date = %bar.date,
                    data_source,
                    error = %error,
                    "skipping price row that failed to store"
                ),
            }
        }

        Ok(stored)
    }

    /// Delete rows by instrument and/or fetch age. With neither filter the
    /// whole cache is cleared.
    pub fn invalidate_cache(
        &self,
        instrument_id: Option<i64>,
        older_than_days: Option<u32>,
    ) -> Result<usize, WarehouseError> {
        let cutoff = older_than_days
            .map(|days| dates::format_timestamp(self.clock.now() - Duration::days(i64::from(days))))
            .transpose()?;

        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();
        if let Some(instrument_id) = instrument_id.as_ref() {
            clauses.push("instrument_id = ?");
            params.push(instrument_id);
        }
        if let Some(cutoff) = cutoff.as_ref() {
            clauses.push("fetched_at < CAST(? AS TIMESTAMP)");
            params.push(cutoff);
        }

        let mut sql = String::from("DELETE FROM price_cache");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let connection = self.manager.acquire()?;
        let deleted = connection.execute(&sql, params.as_slice())?;
        tracing::info!(?instrument_id, ?older_than_days, deleted, "invalidated cached prices");
        Ok(deleted)
    }

    /// Delete stale realtime rows and stale recent end-of-day rows.
    /// Historical end-of-day rows are left in place.
    pub fn cleanup_stale_cache(&self) -> Result<CleanupReport, WarehouseError> {
        let now = self.clock.now();
        let realtime_cutoff = dates::format_timestamp(self.policy.fetched_cutoff(now, true))?;
        let eod_cutoff = dates::format_timestamp(self.policy.fetched_cutoff(now, false))?;
        let recent_cutoff = dates::format_date(self.policy.recent_cutoff(now))?;

        let connection = self.manager.acquire()?;
        let realtime_deleted = connection.execute(
            "DELETE FROM price_cache WHERE is_realtime AND fetched_at < CAST(? AS TIMESTAMP)",
            params![realtime_cutoff],
        )?;
        let eod_deleted = connection.execute(
            r#"
DELETE FROM price_cache
WHERE NOT is_realtime
  AND price_date >= CAST(? AS DATE)
  AND fetched_at < CAST(? AS TIMESTAMP)
"#,
            params![recent_cutoff, eod_cutoff],
        )?;

        let report = CleanupReport {
            realtime_deleted,
            eod_deleted,
            total_deleted: realtime_deleted + eod_deleted,
        };
        tracing::info!(
            realtime_deleted,
            eod_deleted,
            total_deleted = report.total_deleted,
            "cleaned up stale cache rows"
        );
        Ok(report)
    }

    pub fn get_cache_stats(&self) -> Result<CacheStats, WarehouseError> {
        let connection = self.manager.acquire()?;

        let (total, instruments, oldest, newest, realtime): (
            i64,
            i64,
            Option<String>,
            Option<String>,
            i64,
        ) = connection.query_row(
            r#"
SELECT
    COUNT(*),
    COUNT(DISTINCT instrument_id),
    CAST(MIN(price_date) AS VARCHAR),
    CAST(MAX(price_date) AS VARCHAR),
    COUNT(*) FILTER (WHERE is_realtime)
FROM price_cache
"#,
            [],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        )?;

        let mut statement = connection.prepare(
            "SELECT data_source, COUNT(*) FROM price_cache GROUP BY data_source ORDER BY data_source",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut by_source = BTreeMap::new();
        for row in rows {
            let (source, count) = row?;
            by_source.insert(source, to_count(count));
        }

        Ok(CacheStats {
            total_records: to_count(total),
            unique_instruments: to_count(instruments),
            oldest_date: oldest.as_deref().map(dates::parse_date).transpose()?,
            newest_date: newest.as_deref().map(dates::parse_date).transpose()?,
            realtime_count: to_count(realtime),
            by_source,
        })
    }
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::Warehouse;
    use time::macros::{date, datetime};

    fn bar(date: Date, close: f64) -> PriceBar {
        PriceBar {
            date,
            open: Some(close - 1.0),
            high: Some(close + 1.0),
            low: Some(close - 2.0),
            close: Some(close),
            adj_close: Some(close),
            volume: Some(1_000),
        }
    }

    fn store_at(now: OffsetDateTime) -> (PriceCacheStore, ManualClock) {
        let clock = ManualClock::new(now);
        let warehouse = Warehouse::open_in_memory()
            .expect("warehouse")
            .with_clock(Arc::new(clock.clone()));
        (warehouse.price_cache(), clock)
    }

    #[test]
    fn upsert_replaces_values_and_provenance() {
        let (store, clock) = store_at(datetime!(2024-03-15 15:00 UTC));
        let day = date!(2024 - 03 - 14);

        assert_eq!(store.store_prices(1, &[bar(day, 10.0)], "yfinance", false).expect("store"), 1);
        clock.advance(Duration::minutes(1));
        assert_eq!(
            store.store_prices(1, &[bar(day, 12.5)], "alpha_vantage", true).expect("store"),
            1
        );

        let rows = store
            .get_cached_prices(1, day, day)
            .expect("read")
            .expect("fresh hit");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].bar.close, Some(12.5));
        assert_eq!(rows[0].data_source, "alpha_vantage");
        assert!(rows[0].is_realtime);
        assert_eq!(rows[0].fetched_at, datetime!(2024-03-15 15:01 UTC));
    }

    #[test]
    fn null_values_survive_storage() {
        let (store, _clock) = store_at(datetime!(2024-03-15 15:00 UTC));
        let day = date!(2024 - 03 - 13);
        store
            .store_prices(3, &[PriceBar::empty(day)], "local", false)
            .expect("store");

        let rows = store.get_cached_prices(3, day, day).expect("read").expect("hit");
        assert_eq!(rows[0].bar, PriceBar::empty(day));
    }

    #[test]
    fn empty_range_is_a_miss() {
        let (store, _clock) = store_at(datetime!(2024-03-15 15:00 UTC));
        store
            .store_prices(1, &[bar(date!(2024 - 03 - 01), 5.0)], "yfinance", false)
            .expect("store");

        let miss = store
            .get_cached_prices(1, date!(2024 - 03 - 10), date!(2024 - 03 - 12))
            .expect("read");
        assert!(miss.is_none());
        let other_instrument = store
            .get_cached_prices(2, date!(2024 - 03 - 01), date!(2024 - 03 - 01))
            .expect("read");
        assert!(other_instrument.is_none());
    }

    #[test]
    fn invalidate_filters_compose() {
        let (store, clock) = store_at(datetime!(2024-03-01 12:00 UTC));
        store
            .store_prices(1, &[bar(date!(2024 - 02 - 01), 1.0)], "yfinance", false)
            .expect("store");
        store
            .store_prices(2, &[bar(date!(2024 - 02 - 01), 1.0)], "yfinance", false)
            .expect("store");
        clock.advance(Duration::days(10));
        store
            .store_prices(1, &[bar(date!(2024 - 02 - 02), 1.0)], "yfinance", false)
            .expect("store");

        assert_eq!(store.invalidate_cache(Some(1), Some(5)).expect("invalidate"), 1);
        assert_eq!(store.get_cache_stats().expect("stats").total_records, 2);
        assert_eq!(store.invalidate_cache(None, None).expect("clear"), 2);
        assert_eq!(store.get_cache_stats().expect("stats").total_records, 0);
    }

    #[test]
    fn stats_summarize_rows() {
        let (store, _clock) = store_at(datetime!(2024-03-15 15:00 UTC));
        store
            .store_prices(
                1,
                &[bar(date!(2024 - 03 - 11), 1.0), bar(date!(2024 - 03 - 12), 2.0)],
                "yfinance",
                false,
            )
            .expect("store");
        store
            .store_prices(2, &[bar(date!(2024 - 03 - 15), 3.0)], "alpha_vantage", true)
            .expect("store");

        let stats = store.get_cache_stats().expect("stats");
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.unique_instruments, 2);
        assert_eq!(stats.oldest_date, Some(date!(2024 - 03 - 11)));
        assert_eq!(stats.newest_date, Some(date!(2024 - 03 - 15)));
        assert_eq!(stats.realtime_count, 1);
        assert_eq!(stats.by_source.get("yfinance"), Some(&2));
        assert_eq!(stats.by_source.get("alpha_vantage"), Some(&1));
    }

    #[test]
    fn empty_cache_stats_have_no_dates() {
        let (store, _clock) = store_at(datetime!(2024-03-15 15:00 UTC));
        let stats = store.get_cache_stats().expect("stats");
        assert_eq!(stats, CacheStats::default());
    }
}
