use std::sync::Arc;

use serde::Serialize;
use tickwarden_warehouse::{Clock, PriceBar, Warehouse};

use crate::domain::{DataMethod, DateRange, PriceSeries, Symbol};
use crate::error::RouteError;
use crate::routing::FallbackRouter;
use crate::session::MarketSession;
use crate::trace::RouteTrace;
use crate::vendor::{VendorPayload, VendorRequest};

/// Where a price lookup was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceOrigin {
    Cache,
    Vendor,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceLookup {
    pub symbol: Symbol,
    pub range: DateRange,
    pub origin: PriceOrigin,
    pub series: PriceSeries,
    /// Present when vendors were called.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<RouteTrace>,
}

/// Read-through price access: cache first, vendors on a miss, then write back.
///
/// Cache failures never fail a lookup; they are logged and the call falls
/// through to the vendors.
pub struct CachedPriceRouter {
    router: Arc<FallbackRouter>,
    warehouse: Warehouse,
    session: MarketSession,
    clock: Arc<dyn Clock>,
}

impl CachedPriceRouter {
    pub fn new(router: Arc<FallbackRouter>, warehouse: Warehouse, session: MarketSession) -> Self {
        let clock = warehouse.clock();
        Self {
            router,
            warehouse,
            session,
            clock,
        }
    }

    pub fn router(&self) -> &FallbackRouter {
        &self.router
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    pub fn get_prices(&self, symbol: &Symbol, range: DateRange) -> Result<PriceLookup, RouteError> {
        let instrument_id = match self.warehouse.instruments().resolve_or_create(symbol.as_str()) {
            Ok(id) => Some(id),
            Err(error) => {
                tracing::warn!(
                    symbol = %symbol,
                    error = %error,
                    "instrument lookup failed, bypassing cache"
                );
                None
            }
        };

        if let Some(instrument_id) = instrument_id {
            match self
                .warehouse
                .price_cache()
                .get_cached_prices(instrument_id, range.start(), range.end())
            {
                Ok(Some(records)) => {
                    tracing::debug!(instrument_id, rows = records.len(), "price cache hit");
                    return Ok(PriceLookup {
                        symbol: symbol.clone(),
                        range,
                        origin: PriceOrigin::Cache,
                        series: PriceSeries::from_records(&records),
                        trace: None,
                    });
                }
                Ok(None) => tracing::debug!(instrument_id, "price cache miss"),
                Err(error) => {
                    tracing::warn!(
                        instrument_id,
                        error = %error,
                        "price cache read failed, falling through to vendors"
                    );
                }
            }
        }

        let routed = self
            .router
            .route(&VendorRequest::prices(symbol.clone(), range))?;
        let series = match routed.payload {
            VendorPayload::Prices(series) => series,
            other => {
                return Err(RouteError::UnexpectedPayload {
                    method: DataMethod::GetStockData,
                    actual: other.kind(),
                })
            }
        };

        if let Some(instrument_id) = instrument_id {
            let source = routed
                .trace
                .served_by
                .iter()
                .map(|vendor| vendor.as_str())
                .collect::<Vec<_>>()
                .join(",");
            self.write_back(instrument_id, &series, &source);
        }

        Ok(PriceLookup {
            symbol: symbol.clone(),
            range,
            origin: PriceOrigin::Vendor,
            series,
            trace: Some(routed.trace),
        })
    }

    /// Store realtime and final bars in separate calls so each carries the
    /// right flag.
    fn write_back(&self, instrument_id: i64, series: &PriceSeries, source: &str) {
        let now = self.clock.now();
        let (realtime, settled): (Vec<PriceBar>, Vec<PriceBar>) = series
            .bars()
            .iter()
            .cloned()
            .partition(|bar| self.session.is_realtime(bar.date, now));

        let cache = self.warehouse.price_cache();
        for (bars, is_realtime) in [(settled, false), (realtime, true)] {
            if bars.is_empty() {
                continue;
            }
            match cache.store_prices(instrument_id, &bars, source, is_realtime) {
                Ok(stored) => {
                    tracing::debug!(
                        instrument_id,
                        stored,
                        is_realtime,
                        data_source = source,
                        "cached vendor prices"
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        instrument_id,
                        is_realtime,
                        error = %error,
                        "failed to cache vendor prices"
                    );
                }
            }
        }
    }
}
