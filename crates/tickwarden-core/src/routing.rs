use std::collections::HashSet;
use std::time::Instant;

use crate::config::{DataConfig, VendorChain, VendorConfig};
use crate::domain::DataMethod;
use crate::error::RouteError;
use crate::trace::{AttemptOutcome, RouteTrace, VendorAttempt};
use crate::vendor::{
    VendorError, VendorErrorKind, VendorId, VendorPayload, VendorRegistry, VendorRequest,
};

/// Vendor plan for one method, as the router would execute it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectiveChain {
    /// Configured as `skip`.
    Skip,
    Vendors {
        /// Vendors named by configuration, in priority order.
        configured: Vec<VendorId>,
        /// Configured vendors followed by the other registered vendors,
        /// deduplicated, minus vendors the runtime cannot use.
        chain: Vec<VendorId>,
    },
}

/// Successful routed call.
#[derive(Debug, Clone)]
pub struct RoutedPayload {
    pub payload: VendorPayload,
    pub trace: RouteTrace,
}

/// Ordered vendor fallback with aggregation and placeholder degradation.
#[derive(Debug, Clone)]
pub struct FallbackRouter {
    vendors: VendorConfig,
    registry: VendorRegistry,
    runtime_is_local: bool,
}

impl FallbackRouter {
    pub fn new(vendors: VendorConfig, registry: VendorRegistry) -> Self {
        Self {
            vendors,
            registry,
            runtime_is_local: false,
        }
    }

    pub fn from_config(config: &DataConfig, registry: VendorRegistry) -> Self {
        Self::new(config.vendors.clone(), registry).with_local_runtime(config.runtime_is_local())
    }

    /// Drop vendors that need a hosted runtime from every chain.
    pub fn with_local_runtime(mut self, runtime_is_local: bool) -> Self {
        self.runtime_is_local = runtime_is_local;
        self
    }

    pub fn registry(&self) -> &VendorRegistry {
        &self.registry
    }

    pub fn effective_chain(&self, method: DataMethod) -> EffectiveChain {
        let configured = match self.vendors.resolve(method) {
            Some(VendorChain::Skip) => return EffectiveChain::Skip,
            Some(VendorChain::Ordered(vendors)) => vendors.clone(),
            None => Vec::new(),
        };

        let mut candidates = configured.clone();
        candidates.extend(self.registry.vendors_for(method));
        let chain = dedupe_chain(&candidates)
            .into_iter()
            .filter(|vendor| {
                !(self.runtime_is_local && self.registry.requires_hosted_runtime(vendor))
            })
            .collect();

        EffectiveChain::Vendors { configured, chain }
    }

    /// Route `request` through the method's vendor chain.
    ///
    /// Optional methods never fail on vendor trouble: a skipped or fully
    /// failed optional method yields a placeholder text tagged as degraded
    /// in the trace. Required methods fail with
    /// [`RouteError::AllVendorsFailed`].
    pub fn route(&self, request: &VendorRequest) -> Result<RoutedPayload, RouteError> {
        let method = request.method;
        if method.needs_symbol() {
            request.require_symbol()?;
        }
        if method.returns_prices() {
            request.require_range()?;
        }

        let mut trace = RouteTrace::start(method);
        let span = tracing::info_span!("route", request_id = %trace.request_id, method = %method);
        let _entered = span.enter();

        let (configured, chain) = match self.effective_chain(method) {
            EffectiveChain::Skip if method.is_optional() => {
                tracing::info!("method configured as skip, returning placeholder");
                trace.finish(true);
                return Ok(RoutedPayload {
                    payload: VendorPayload::Text(skipped_placeholder(method)),
                    trace,
                });
            }
            EffectiveChain::Skip => return Err(RouteError::SkipNotAllowed { method }),
            EffectiveChain::Vendors { configured, chain } => (configured, chain),
        };
        trace.chain = chain.clone();

        let aggregate = configured.len() > 1;
        let mut results = Vec::new();
        for vendor in &chain {
            if !results.is_empty() && (!aggregate || !configured.contains(vendor)) {
                break;
            }

            let attempt = self.attempt(vendor, request);
            if attempt.record.outcome == AttemptOutcome::Used
                && results.is_empty()
                && !trace.attempts.is_empty()
            {
                tracing::info!(vendor = %vendor, "served after fallback");
            }
            results.extend(attempt.payloads);
            trace.record(attempt.record);
        }

        match VendorPayload::aggregate(results) {
            Some(payload) => {
                trace.finish(false);
                Ok(RoutedPayload { payload, trace })
            }
            None if method.is_optional() => {
                tracing::warn!(
                    attempted = trace.attempts.len(),
                    "all vendors failed, returning placeholder"
                );
                let payload = VendorPayload::Text(failed_placeholder(method, trace.attempts.len()));
                trace.finish(true);
                Ok(RoutedPayload { payload, trace })
            }
            None => Err(RouteError::AllVendorsFailed {
                method,
                attempted: trace.attempts.len(),
            }),
        }
    }

    /// Invoke every implementation bound to `vendor`, keeping each success.
    fn attempt(&self, vendor: &VendorId, request: &VendorRequest) -> Attempt {
        let started = Instant::now();
        let Some(binding) = self.registry.binding(request.method, vendor) else {
            let error = VendorError::unsupported(vendor, request.method);
            tracing::debug!(
                vendor = %vendor,
                outcome = "unsupported",
                "vendor not registered for method"
            );
            return Attempt::failed(vendor, &error, started);
        };

        let implementations = binding.implementations();
        let mut payloads = Vec::with_capacity(implementations.len());
        let mut last_error = None;
        for implementation in implementations {
            match implementation.fetch(request) {
                Ok(payload) => payloads.push(payload),
                Err(error) => {
                    if error.kind() == VendorErrorKind::RateLimited {
                        tracing::warn!(
                            vendor = %vendor,
                            outcome = "rate_limited",
                            error = %error,
                            "vendor rate limited"
                        );
                    } else {
                        tracing::warn!(
                            vendor = %vendor,
                            outcome = "failed",
                            error = %error,
                            "vendor call failed"
                        );
                    }
                    last_error = Some(error);
                }
            }
        }

        if payloads.is_empty() {
            let error =
                last_error.unwrap_or_else(|| VendorError::unsupported(vendor, request.method));
            return Attempt::failed(vendor, &error, started);
        }

        tracing::debug!(
            vendor = %vendor,
            outcome = "used",
            results = payloads.len(),
            "vendor answered"
        );
        Attempt {
            record: VendorAttempt {
                vendor: vendor.clone(),
                outcome: AttemptOutcome::Used,
                results: payloads.len(),
                error_code: None,
                error: None,
                elapsed_ms: elapsed_ms(started),
            },
            payloads,
        }
    }
}

struct Attempt {
    record: VendorAttempt,
    payloads: Vec<VendorPayload>,
}

impl Attempt {
    fn failed(vendor: &VendorId, error: &VendorError, started: Instant) -> Self {
        Self {
            record: VendorAttempt {
                vendor: vendor.clone(),
                outcome: AttemptOutcome::from_error(error),
                results: 0,
                error_code: Some(error.code()),
                error: Some(error.message().to_string()),
                elapsed_ms: elapsed_ms(started),
            },
            payloads: Vec::new(),
        }
    }
}

/// Placeholder for an optional method configured as `skip`.
pub fn skipped_placeholder(method: DataMethod) -> String {
    format!("[{method}] skipped: no vendor configured for this data")
}

/// Placeholder for an optional method whose vendors all failed.
pub fn failed_placeholder(method: DataMethod, attempted: usize) -> String {
    format!("[{method}] unavailable: all {attempted} vendor(s) failed")
}

fn dedupe_chain(chain: &[VendorId]) -> Vec<VendorId> {
    let mut seen = HashSet::new();
    let mut output = Vec::with_capacity(chain.len());

    for vendor in chain {
        if seen.insert(vendor) {
            output.push(vendor.clone());
        }
    }

    output
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
