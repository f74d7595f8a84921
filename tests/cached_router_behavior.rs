//! Behavior-driven tests for cache-aware price routing
//!
//! These tests verify the read-through path: a miss goes to the vendors and
//! writes back, a fresh range is served from the cache, and stale rows force
//! a refetch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tickwarden_core::{
    CachedPriceRouter, DataMethod, DateRange, FallbackRouter, ManualClock, MarketSession,
    PriceBar, PriceOrigin, PriceSeries, RouteError, Symbol, VendorChain, VendorConfig,
    VendorError, VendorId, VendorImplementation, VendorPayload, VendorRegistry, VendorRequest,
    Warehouse,
};
use time::macros::{date, datetime};
use time::{Date, Duration, OffsetDateTime};

/// Friday 10:00 at the exchange (UTC-5), session open.
const NOW: OffsetDateTime = datetime!(2024-03-15 15:00 UTC);

/// Serves a fixed payload filtered to the requested range and counts calls.
struct CountingVendor {
    calls: AtomicUsize,
    result: Result<VendorPayload, VendorError>,
}

impl CountingVendor {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VendorImplementation for CountingVendor {
    fn fetch(&self, request: &VendorRequest) -> Result<VendorPayload, VendorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match (&self.result, request.range) {
            (Ok(VendorPayload::Prices(series)), Some(range)) => {
                Ok(VendorPayload::Prices(series.clone().within(range)))
            }
            (other, _) => other.clone(),
        }
    }
}

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

fn daily_series(days: &[Date]) -> PriceSeries {
    PriceSeries::new(
        days.iter()
            .enumerate()
            .map(|(index, day)| bar(*day, 100.0 + index as f64))
            .collect(),
    )
}

struct Harness {
    prices: CachedPriceRouter,
    vendor: Arc<CountingVendor>,
    clock: ManualClock,
}

fn harness(result: Result<VendorPayload, VendorError>) -> Harness {
    let vendor = Arc::new(CountingVendor {
        calls: AtomicUsize::new(0),
        result,
    });
    let mut registry = VendorRegistry::new();
    registry.register_single(
        DataMethod::GetStockData,
        VendorId::parse("fake").expect("vendor id"),
        Arc::clone(&vendor) as Arc<dyn VendorImplementation>,
    );
    let config = VendorConfig::default().with_method(
        DataMethod::GetStockData,
        VendorChain::Ordered(vec![VendorId::parse("fake").expect("vendor id")]),
    );

    let clock = ManualClock::new(NOW);
    let warehouse = Warehouse::open_in_memory()
        .expect("warehouse open")
        .with_clock(Arc::new(clock.clone()));
    let prices = CachedPriceRouter::new(
        Arc::new(FallbackRouter::new(config, registry)),
        warehouse,
        MarketSession::default(),
    );

    Harness {
        prices,
        vendor,
        clock,
    }
}

fn aapl() -> Symbol {
    Symbol::parse("AAPL").expect("symbol")
}

fn range(start: Date, end: Date) -> DateRange {
    DateRange::new(start, end).expect("range")
}

// =============================================================================
// Cached Router: Read-Through
// =============================================================================

#[test]
fn when_range_is_missing_vendor_is_called_and_result_is_cached() {
    // Given: An empty cache and a vendor with four recent sessions
    let days = [
        date!(2024 - 03 - 11),
        date!(2024 - 03 - 12),
        date!(2024 - 03 - 13),
        date!(2024 - 03 - 14),
    ];
    let h = harness(Ok(VendorPayload::Prices(daily_series(&days))));
    let window = range(days[0], days[3]);

    // When: The range is requested twice
    let first = h.prices.get_prices(&aapl(), window).expect("first lookup");
    let second = h.prices.get_prices(&aapl(), window).expect("second lookup");

    // Then: The vendor is called once and the second answer comes from cache
    assert_eq!(first.origin, PriceOrigin::Vendor);
    assert!(first.trace.is_some());
    assert_eq!(second.origin, PriceOrigin::Cache);
    assert!(second.trace.is_none());
    assert_eq!(h.vendor.calls(), 1);
    assert_eq!(first.series, second.series);

    let stats = h.prices.warehouse().price_cache().get_cache_stats().expect("stats");
    assert_eq!(stats.total_records, 4);
    assert_eq!(stats.by_source.get("fake"), Some(&4));
    assert_eq!(stats.realtime_count, 0);
}

#[test]
fn when_recent_rows_age_past_eod_ttl_vendor_is_called_again() {
    // Given: A cached range of recent sessions
    let days = [date!(2024 - 03 - 13), date!(2024 - 03 - 14)];
    let h = harness(Ok(VendorPayload::Prices(daily_series(&days))));
    let window = range(days[0], days[1]);
    h.prices.get_prices(&aapl(), window).expect("prime cache");

    // When: More than 24 hours pass
    h.clock.advance(Duration::hours(24) + Duration::minutes(1));
    let lookup = h.prices.get_prices(&aapl(), window).expect("refetch");

    // Then: The stale range is refetched
    assert_eq!(lookup.origin, PriceOrigin::Vendor);
    assert_eq!(h.vendor.calls(), 2);
}

#[test]
fn when_todays_bar_is_fetched_during_session_it_is_stored_as_realtime() {
    // Given: A vendor returning yesterday's and today's bars mid-session
    let days = [date!(2024 - 03 - 14), date!(2024 - 03 - 15)];
    let h = harness(Ok(VendorPayload::Prices(daily_series(&days))));
    let window = range(days[0], days[1]);

    // When: The range is fetched
    h.prices.get_prices(&aapl(), window).expect("fetch");

    // Then: Only today's bar carries the realtime flag
    let cache = h.prices.warehouse().price_cache();
    let stats = cache.get_cache_stats().expect("stats");
    assert_eq!(stats.total_records, 2);
    assert_eq!(stats.realtime_count, 1);

    // And: Six minutes later the realtime row makes the range a miss
    h.clock.advance(Duration::minutes(4));
    assert_eq!(
        h.prices.get_prices(&aapl(), window).expect("still fresh").origin,
        PriceOrigin::Cache
    );
    h.clock.advance(Duration::minutes(2));
    assert_eq!(
        h.prices.get_prices(&aapl(), window).expect("refetch").origin,
        PriceOrigin::Vendor
    );
    assert_eq!(h.vendor.calls(), 2);
}

#[test]
fn when_rows_are_historical_they_stay_cached_indefinitely() {
    // Given: A cached range well outside the recent window
    let days = [date!(2024 - 01 - 02), date!(2024 - 01 - 03)];
    let h = harness(Ok(VendorPayload::Prices(daily_series(&days))));
    let window = range(days[0], days[1]);
    h.prices.get_prices(&aapl(), window).expect("prime cache");

    // When: A month passes
    h.clock.advance(Duration::days(30));
    let lookup = h.prices.get_prices(&aapl(), window).expect("lookup");

    // Then: The cache still answers
    assert_eq!(lookup.origin, PriceOrigin::Cache);
    assert_eq!(h.vendor.calls(), 1);
}

// =============================================================================
// Cached Router: Failures and Edge Cases
// =============================================================================

#[test]
fn when_every_vendor_fails_error_propagates_and_nothing_is_cached() {
    // Given: The only price vendor is down
    let h = harness(Err(VendorError::unavailable("HTTP 503")));

    // When: Prices are requested
    let error = h
        .prices
        .get_prices(&aapl(), range(date!(2024 - 03 - 11), date!(2024 - 03 - 14)))
        .expect_err("required method must fail");

    // Then: The hard failure surfaces and the cache stays empty
    assert!(matches!(
        error,
        RouteError::AllVendorsFailed {
            method: DataMethod::GetStockData,
            attempted: 1
        }
    ));
    let stats = h.prices.warehouse().price_cache().get_cache_stats().expect("stats");
    assert_eq!(stats.total_records, 0);
}

#[test]
fn when_vendor_returns_text_for_prices_lookup_fails() {
    // Given: A misbehaving vendor that answers prices with text
    let h = harness(Ok(VendorPayload::Text(String::from("not prices"))));

    // When: Prices are requested
    let error = h
        .prices
        .get_prices(&aapl(), range(date!(2024 - 03 - 11), date!(2024 - 03 - 14)))
        .expect_err("unexpected payload");

    // Then: The mismatch is reported
    assert!(matches!(
        error,
        RouteError::UnexpectedPayload {
            actual: "text",
            ..
        }
    ));
}

#[test]
fn when_range_has_no_trading_days_result_is_empty_and_not_cached() {
    // Given: A weekend range with no bars
    let h = harness(Ok(VendorPayload::Prices(PriceSeries::default())));
    let weekend = range(date!(2024 - 03 - 09), date!(2024 - 03 - 10));

    // When: The range is requested twice
    let first = h.prices.get_prices(&aapl(), weekend).expect("empty answer");
    let second = h.prices.get_prices(&aapl(), weekend).expect("empty answer");

    // Then: Both are empty vendor answers since nothing could be cached
    assert!(first.series.is_empty());
    assert_eq!(second.origin, PriceOrigin::Vendor);
    assert_eq!(h.vendor.calls(), 2);
}
