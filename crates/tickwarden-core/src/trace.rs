//! Audit record of one routed call: which vendors were tried, how each
//! attempt ended, and who served the answer.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::DataMethod;
use crate::vendor::{VendorError, VendorErrorKind, VendorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Returned data that is part of the answer.
    Used,
    RateLimited,
    Unsupported,
    CircuitOpen,
    Failed,
}

impl AttemptOutcome {
    pub fn from_error(error: &VendorError) -> Self {
        match error.kind() {
            VendorErrorKind::RateLimited => Self::RateLimited,
            VendorErrorKind::Unsupported => Self::Unsupported,
            VendorErrorKind::CircuitOpen => Self::CircuitOpen,
            VendorErrorKind::Unavailable
            | VendorErrorKind::InvalidResponse
            | VendorErrorKind::NotFound
            | VendorErrorKind::Internal => Self::Failed,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Used => "used",
            Self::RateLimited => "rate_limited",
            Self::Unsupported => "unsupported",
            Self::CircuitOpen => "circuit_open",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VendorAttempt {
    pub vendor: VendorId,
    pub outcome: AttemptOutcome,
    /// Successful sub-results contributed by this vendor.
    pub results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteTrace {
    pub request_id: Uuid,
    pub method: DataMethod,
    /// Effective chain after dedupe and runtime filtering.
    pub chain: Vec<VendorId>,
    pub attempts: Vec<VendorAttempt>,
    pub served_by: Vec<VendorId>,
    pub fallback_occurred: bool,
    /// A placeholder was returned instead of vendor data.
    pub degraded: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
}

impl RouteTrace {
    pub fn start(method: DataMethod) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            request_id: Uuid::new_v4(),
            method,
            chain: Vec::new(),
            attempts: Vec::new(),
            served_by: Vec::new(),
            fallback_occurred: false,
            degraded: false,
            started_at: now,
            finished_at: now,
        }
    }

    pub(crate) fn record(&mut self, attempt: VendorAttempt) {
        if attempt.outcome == AttemptOutcome::Used {
            self.served_by.push(attempt.vendor.clone());
        }
        self.attempts.push(attempt);
    }

    /// Close the trace. Fallback means the answer did not come from the head
    /// of the chain.
    pub(crate) fn finish(&mut self, degraded: bool) {
        self.degraded = degraded;
        self.fallback_occurred = match (self.chain.first(), self.served_by.first()) {
            (Some(head), Some(first)) => head != first,
            _ => false,
        };
        self.finished_at = OffsetDateTime::now_utc();
    }

    /// First vendor whose data is in the answer.
    pub fn primary_vendor(&self) -> Option<&VendorId> {
        self.served_by.first()
    }

    pub fn outcome_of(&self, vendor: &VendorId) -> Option<AttemptOutcome> {
        self.attempts
            .iter()
            .find(|attempt| &attempt.vendor == vendor)
            .map(|attempt| attempt.outcome)
    }
}
