//! Two-tier freshness rules for cached price rows.
//!
//! Realtime rows (captured intraday) and end-of-day rows age out on separate
//! TTLs. End-of-day rows dated before the recent window are historical and
//! never considered stale. The same policy drives cache reads and cleanup.

use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};

pub const DEFAULT_REALTIME_TTL_SECS: u64 = 300;
pub const DEFAULT_EOD_TTL_SECS: u64 = 86_400;
pub const DEFAULT_RECENT_WINDOW_DAYS: u32 = 7;

/// Freshness thresholds for cached rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StalenessPolicy {
    pub realtime_ttl_secs: u64,
    pub eod_ttl_secs: u64,
    pub recent_window_days: u32,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            realtime_ttl_secs: DEFAULT_REALTIME_TTL_SECS,
            eod_ttl_secs: DEFAULT_EOD_TTL_SECS,
            recent_window_days: DEFAULT_RECENT_WINDOW_DAYS,
        }
    }
}

impl StalenessPolicy {
    #[must_use]
    pub fn realtime_ttl(&self) -> Duration {
        Duration::seconds(saturating_secs(self.realtime_ttl_secs))
    }

    #[must_use]
    pub fn eod_ttl(&self) -> Duration {
        Duration::seconds(saturating_secs(self.eod_ttl_secs))
    }

    /// Earliest price date still inside the recent window, relative to `now`.
    #[must_use]
    pub fn recent_cutoff(&self, now: OffsetDateTime) -> Date {
        now.date() - Duration::days(i64::from(self.recent_window_days))
    }

    /// Rows fetched before this instant are stale for their tier.
    #[must_use]
    pub fn fetched_cutoff(&self, now: OffsetDateTime, is_realtime: bool) -> OffsetDateTime {
        let ttl = if is_realtime {
            self.realtime_ttl()
        } else {
            self.eod_ttl()
        };
        now - ttl
    }

    /// A row is stale when its age strictly exceeds the TTL of its tier.
    #[must_use]
    pub fn is_stale(
        &self,
        price_date: Date,
        fetched_at: OffsetDateTime,
        is_realtime: bool,
        now: OffsetDateTime,
    ) -> bool {
        if !is_realtime && price_date < self.recent_cutoff(now) {
            return false;
        }
        fetched_at < self.fetched_cutoff(now, is_realtime)
    }
}

fn saturating_secs(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}
