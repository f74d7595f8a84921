use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::vendor::{VendorError, VendorId};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Local request budget for one vendor.
///
/// Exhaustion is reported as a rate-limit error instead of waiting, so the
/// router moves on to the next vendor.
#[derive(Clone)]
pub struct VendorThrottle {
    vendor: VendorId,
    limiter: Arc<DirectRateLimiter>,
}

impl VendorThrottle {
    pub fn new(vendor: VendorId, quota_window: Duration, quota_limit: u32) -> Self {
        Self {
            vendor,
            limiter: Arc::new(RateLimiter::direct(quota_from_window(
                quota_window,
                quota_limit,
            ))),
        }
    }

    pub fn per_minute(vendor: VendorId, limit: u32) -> Self {
        Self::new(vendor, Duration::from_secs(60), limit)
    }

    /// Take one unit of budget.
    pub fn acquire(&self) -> Result<(), VendorError> {
        self.limiter.check().map_err(|_| {
            tracing::debug!(vendor = %self.vendor, "local request budget exhausted");
            VendorError::rate_limited(format!(
                "local request budget for '{}' is exhausted",
                self.vendor
            ))
        })
    }
}

impl std::fmt::Debug for VendorThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorThrottle")
            .field("vendor", &self.vendor)
            .finish_non_exhaustive()
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let burst = NonZeroU32::new(quota_limit.max(1)).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(burst.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
