use std::sync::Arc;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitError, CircuitSnapshot};
use crate::retry::{Retrier, RetryPolicy};
use crate::vendor::{
    VendorError, VendorErrorKind, VendorId, VendorImplementation, VendorPayload, VendorRequest,
};

/// Wraps a vendor with retry inside a circuit breaker.
///
/// Only `Unavailable` errors are retried. Rate limits are never retried
/// against the same vendor. Client-side outcomes (`NotFound`, `Unsupported`,
/// `RateLimited`) do not count toward opening the breaker.
pub struct ResilientVendor {
    vendor: VendorId,
    inner: Arc<dyn VendorImplementation>,
    breaker: CircuitBreaker,
    retrier: Retrier,
}

impl ResilientVendor {
    pub fn new(
        vendor: VendorId,
        inner: Arc<dyn VendorImplementation>,
        breaker: CircuitBreakerConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            vendor,
            inner,
            breaker: CircuitBreaker::new(breaker),
            retrier: Retrier::new(retry),
        }
    }

    pub fn with_retrier(mut self, retrier: Retrier) -> Self {
        self.retrier = retrier;
        self
    }

    pub fn circuit(&self) -> CircuitSnapshot {
        self.breaker.snapshot()
    }
}

impl VendorImplementation for ResilientVendor {
    fn fetch(&self, request: &VendorRequest) -> Result<VendorPayload, VendorError> {
        let result = self.breaker.call_counting(
            || {
                self.retrier.run(
                    |_| self.inner.fetch(request),
                    |error: &VendorError| error.retryable(),
                )
            },
            |error| {
                matches!(
                    error.kind(),
                    VendorErrorKind::Unavailable
                        | VendorErrorKind::InvalidResponse
                        | VendorErrorKind::Internal
                )
            },
        );

        result.map_err(|error| match error {
            CircuitError::Open => {
                tracing::warn!(vendor = %self.vendor, method = %request.method, "circuit open, call rejected");
                VendorError::circuit_open(&self.vendor)
            }
            CircuitError::Inner(error) => error,
        })
    }
}
