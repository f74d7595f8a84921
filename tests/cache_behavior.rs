//! Behavior-driven tests for the price cache store
//!
//! These tests verify how cached rows are written, judged fresh or stale,
//! and cleaned up, using a manual clock so tier boundaries are exact.

use std::sync::Arc;
use std::thread;

use tempfile::tempdir;
use tickwarden_warehouse::{
    default_db_path, ManualClock, PriceBar, PriceCacheStore, StalenessPolicy, Warehouse,
    WarehouseConfig,
};
use time::macros::{date, datetime};
use time::{Date, Duration, OffsetDateTime};

const NOW: OffsetDateTime = datetime!(2024-03-15 15:00 UTC);

fn bar(date: Date, close: f64) -> PriceBar {
    PriceBar {
        date,
        open: Some(close - 0.5),
        high: Some(close + 1.0),
        low: Some(close - 1.0),
        close: Some(close),
        adj_close: Some(close),
        volume: Some(42_000),
    }
}

fn cache_with_clock(start: OffsetDateTime) -> (PriceCacheStore, ManualClock) {
    let clock = ManualClock::new(start);
    let warehouse = Warehouse::open_in_memory()
        .expect("warehouse open")
        .with_clock(Arc::new(clock.clone()));
    (warehouse.price_cache(), clock)
}

// =============================================================================
// Price Cache: Upsert Semantics
// =============================================================================

#[test]
fn when_same_record_is_stored_twice_exactly_one_row_remains() {
    // Given: A cache with one stored row
    let (cache, _clock) = cache_with_clock(NOW);
    let day = date!(2024 - 03 - 14);
    cache
        .store_prices(7, &[bar(day, 100.0)], "yfinance", false)
        .expect("first store");

    // When: The identical record is stored again
    let stored = cache
        .store_prices(7, &[bar(day, 100.0)], "yfinance", false)
        .expect("second store");

    // Then: The write is counted but the key set is unchanged
    assert_eq!(stored, 1);
    let stats = cache.get_cache_stats().expect("stats");
    assert_eq!(stats.total_records, 1, "upsert must not duplicate rows");
    let rows = cache
        .get_cached_prices(7, day, day)
        .expect("read")
        .expect("fresh hit");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].bar, bar(day, 100.0));
}

#[test]
fn when_many_threads_write_the_same_key_one_row_survives() {
    // Given: A file-backed cache shared by several writers
    let temp = tempdir().expect("tempdir");
    let home = temp.path().join("tickwarden-home");
    let warehouse = Warehouse::open(WarehouseConfig {
        db_path: default_db_path(&home),
        home,
        max_pool_size: 4,
        staleness: StalenessPolicy::default(),
    })
    .expect("warehouse open");
    let day = date!(2024 - 03 - 14);

    // When: Writers race on the same (instrument, date)
    let handles: Vec<_> = (0..4)
        .map(|writer| {
            let cache = warehouse.price_cache();
            thread::spawn(move || {
                let close = 100.0 + f64::from(writer);
                cache
                    .store_prices(1, &[bar(day, close)], "yfinance", false)
                    .expect("store")
            })
        })
        .collect();
    let total: usize = handles
        .into_iter()
        .map(|handle| handle.join().expect("writer thread"))
        .sum();

    // Then: Conflicting writes are skipped rather than duplicated
    assert!((1..=4).contains(&total), "at least one writer must land");
    assert_eq!(
        warehouse.price_cache().get_cache_stats().expect("stats").total_records,
        1
    );
}

// =============================================================================
// Price Cache: Staleness Tiers
// =============================================================================

#[test]
fn realtime_rows_are_fresh_until_five_minutes() {
    // Given: A realtime row for today
    let (cache, clock) = cache_with_clock(NOW);
    let today = date!(2024 - 03 - 15);
    cache
        .store_prices(1, &[bar(today, 10.0)], "yfinance", true)
        .expect("store");

    // When: 4:59 has elapsed
    clock.set(NOW + Duration::seconds(4 * 60 + 59));
    // Then: The row is served
    assert!(cache.get_cached_prices(1, today, today).expect("read").is_some());

    // When: 5:01 has elapsed
    clock.set(NOW + Duration::seconds(5 * 60 + 1));
    // Then: The range is a miss
    assert!(cache.get_cached_prices(1, today, today).expect("read").is_none());
}

#[test]
fn recent_eod_rows_are_fresh_until_twenty_four_hours() {
    // Given: A final row dated within the last week
    let (cache, clock) = cache_with_clock(NOW);
    let day = date!(2024 - 03 - 12);
    cache
        .store_prices(1, &[bar(day, 10.0)], "yfinance", false)
        .expect("store");

    // Then: 23:59 later it is fresh, 24:01 later it is stale
    clock.set(NOW + Duration::minutes(23 * 60 + 59));
    assert!(cache.get_cached_prices(1, day, day).expect("read").is_some());

    clock.set(NOW + Duration::minutes(24 * 60 + 1));
    assert!(cache.get_cached_prices(1, day, day).expect("read").is_none());
}

#[test]
fn historical_eod_rows_never_go_stale() {
    // Given: A 30-day-old final row fetched long ago
    let (cache, clock) = cache_with_clock(NOW - Duration::days(200));
    let old_day = date!(2024 - 02 - 14);
    cache
        .store_prices(1, &[bar(old_day, 10.0)], "alpha_vantage", false)
        .expect("store");

    // When: Read today
    clock.set(NOW);

    // Then: It is still served
    let rows = cache
        .get_cached_prices(1, old_day, old_day)
        .expect("read")
        .expect("historical rows stay cached");
    assert_eq!(rows[0].data_source, "alpha_vantage");
}

#[test]
fn one_stale_row_turns_the_whole_range_into_a_miss() {
    // Given: A historical row and a recent row, fetched two days ago
    let (cache, clock) = cache_with_clock(NOW - Duration::days(2));
    cache
        .store_prices(
            1,
            &[bar(date!(2024 - 02 - 01), 1.0), bar(date!(2024 - 03 - 13), 2.0)],
            "yfinance",
            false,
        )
        .expect("store");

    // When: A fresh row is added for another recent date
    clock.set(NOW);
    cache
        .store_prices(1, &[bar(date!(2024 - 03 - 14), 3.0)], "yfinance", false)
        .expect("store");

    // Then: A range covering the stale recent row misses entirely
    let full = cache
        .get_cached_prices(1, date!(2024 - 02 - 01), date!(2024 - 03 - 14))
        .expect("read");
    assert!(full.is_none(), "partially fresh range must be a miss");

    // And: Ranges that avoid it still hit
    let fresh_only = cache
        .get_cached_prices(1, date!(2024 - 03 - 14), date!(2024 - 03 - 15))
        .expect("read")
        .expect("hit");
    assert_eq!(fresh_only.len(), 1);
    let historical_only = cache
        .get_cached_prices(1, date!(2024 - 01 - 01), date!(2024 - 02 - 28))
        .expect("read")
        .expect("hit");
    assert_eq!(historical_only.len(), 1);
}

// =============================================================================
// Price Cache: Cleanup
// =============================================================================

#[test]
fn cleanup_deletes_only_stale_rows_and_never_historical_ones() {
    // Given: Rows of every tier, written two days ago
    let (cache, clock) = cache_with_clock(NOW - Duration::days(2));
    cache
        .store_prices(1, &[bar(date!(2024 - 03 - 13), 1.0)], "yfinance", true)
        .expect("stale realtime");
    cache
        .store_prices(1, &[bar(date!(2024 - 03 - 12), 1.0)], "yfinance", false)
        .expect("stale recent eod");
    cache
        .store_prices(1, &[bar(date!(2024 - 01 - 02), 1.0)], "yfinance", false)
        .expect("historical");

    // And: A fresh recent row written just now
    clock.set(NOW);
    cache
        .store_prices(1, &[bar(date!(2024 - 03 - 14), 1.0)], "yfinance", false)
        .expect("fresh recent eod");

    // When: Cleanup runs
    let report = cache.cleanup_stale_cache().expect("cleanup");

    // Then: Exactly the two stale rows are removed
    assert_eq!(report.realtime_deleted, 1);
    assert_eq!(report.eod_deleted, 1);
    assert_eq!(report.total_deleted, 2);

    let stats = cache.get_cache_stats().expect("stats");
    assert_eq!(stats.total_records, 2);
    assert_eq!(stats.oldest_date, Some(date!(2024 - 01 - 02)));
    assert_eq!(stats.newest_date, Some(date!(2024 - 03 - 14)));
    assert_eq!(stats.realtime_count, 0);
}

#[test]
fn cleanup_and_reads_agree_on_tier_boundaries() {
    // Given: A custom policy with short TTLs
    let clock = ManualClock::new(NOW);
    let cache = Warehouse::open_in_memory()
        .expect("warehouse open")
        .with_clock(Arc::new(clock.clone()))
        .with_staleness(StalenessPolicy {
            realtime_ttl_secs: 60,
            eod_ttl_secs: 120,
            recent_window_days: 3,
        })
        .price_cache();
    let day = date!(2024 - 03 - 14);
    cache
        .store_prices(1, &[bar(day, 1.0)], "local", false)
        .expect("store");

    // When: Exactly the TTL has elapsed, the row is still fresh for both paths
    clock.advance(Duration::seconds(120));
    assert!(cache.get_cached_prices(1, day, day).expect("read").is_some());
    assert_eq!(cache.cleanup_stale_cache().expect("cleanup").total_deleted, 0);

    // Then: One second later both paths treat it as stale
    clock.advance(Duration::seconds(1));
    assert!(cache.get_cached_prices(1, day, day).expect("read").is_none());
    assert_eq!(cache.cleanup_stale_cache().expect("cleanup").eod_deleted, 1);
}

#[test]
fn invalidating_without_filters_clears_everything() {
    // Given: Rows for two instruments
    let (cache, _clock) = cache_with_clock(NOW);
    cache
        .store_prices(1, &[bar(date!(2024 - 03 - 14), 1.0)], "yfinance", false)
        .expect("store");
    cache
        .store_prices(2, &[bar(date!(2024 - 03 - 14), 1.0)], "yfinance", false)
        .expect("store");

    // When: Invalidating by instrument
    assert_eq!(cache.invalidate_cache(Some(2), None).expect("by instrument"), 1);

    // Then: Only that instrument is gone; clearing removes the rest
    assert_eq!(cache.get_cache_stats().expect("stats").unique_instruments, 1);
    assert_eq!(cache.invalidate_cache(None, None).expect("clear"), 1);
    assert_eq!(cache.get_cache_stats().expect("stats").total_records, 0);
}
