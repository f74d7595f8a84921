use std::fmt::{Display, Formatter};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use time::OffsetDateTime;

/// Runtime circuit state for one protected call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
    /// Consecutive successful probes needed to close from half-open.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_failure_at: Option<OffsetDateTime>,
}

/// Error from [`CircuitBreaker::call`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitError<E> {
    /// Rejected without invoking the wrapped call.
    Open,
    Inner(E),
}

impl<E: Display> Display for CircuitError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => f.write_str("circuit breaker is open"),
            Self::Inner(error) => error.fmt(f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CircuitError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open => None,
            Self::Inner(error) => Some(error),
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<OffsetDateTime>,
}

impl Default for CircuitInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
            last_failure_at: None,
        }
    }
}

/// Thread-safe, process-local circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CircuitInner::default()),
        }
    }

    /// Run `operation` through the breaker; every error counts as a failure.
    pub fn call<T, E, F>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.call_counting(operation, |_| true)
    }

    /// Like [`call`](Self::call), but only errors matching `is_failure` move
    /// the breaker toward open. Other errors pass through without affecting it.
    pub fn call_counting<T, E, F, P>(
        &self,
        operation: F,
        is_failure: P,
    ) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        P: FnOnce(&E) -> bool,
    {
        if !self.allow_request() {
            return Err(CircuitError::Open);
        }

        match operation() {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                if is_failure(&error) {
                    self.record_failure();
                }
                Err(CircuitError::Inner(error))
            }
        }
    }

    /// Whether a call may proceed. An open breaker whose timeout has elapsed
    /// moves to half-open and admits the caller as a probe.
    pub fn allow_request(&self) -> bool {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let can_probe = inner
                    .last_failure
                    .is_some_and(|failed_at| failed_at.elapsed() > self.config.open_timeout);

                if can_probe {
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count = 0;
                    tracing::debug!("circuit breaker half-open, admitting probe");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count = inner.success_count.saturating_add(1);
                if inner.success_count >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    tracing::info!("circuit breaker closed after successful probes");
                }
            }
            CircuitState::Closed | CircuitState::Open => {
                inner.failure_count = 0;
            }
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.last_failure_at = Some(OffsetDateTime::now_utc());

        let trip = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.failure_count >= self.config.failure_threshold,
            CircuitState::Open => false,
        };
        if trip {
            inner.state = CircuitState::Open;
            inner.success_count = 0;
            tracing::warn!(
                failure_count = inner.failure_count,
                "circuit breaker opened"
            );
        }
    }

    pub fn state(&self) -> CircuitState {
        self.snapshot().state
    }

    pub fn failure_count(&self) -> u32 {
        self.snapshot().failure_count
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        CircuitSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_at: inner.last_failure_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            open_timeout: timeout,
            success_threshold: 2,
        })
    }

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = breaker(2, Duration::from_millis(10));

        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());
        assert!(breaker.snapshot().last_failure_at.is_some());
    }

    #[test]
    fn success_while_closed_resets_failures() {
        let breaker = breaker(3, Duration::from_secs(1));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.failure_count(), 0);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn open_breaker_rejects_without_invoking() {
        let breaker = breaker(1, Duration::from_secs(60));
        let _ = breaker.call(|| Err::<(), _>("boom"));

        let mut invoked = false;
        let result = breaker.call(|| {
            invoked = true;
            Ok::<_, &str>(())
        });
        assert_eq!(result, Err(CircuitError::Open));
        assert!(!invoked);
    }

    #[test]
    fn needs_two_probe_successes_to_close() {
        let breaker = breaker(1, Duration::from_millis(1));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(breaker.call(|| Ok::<_, ()>(1)), Ok(1));
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::HalfOpen);
        assert_eq!(snapshot.success_count, 1);

        assert_eq!(breaker.call(|| Ok::<_, ()>(2)), Ok(2));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn failed_probe_reopens_immediately() {
        let breaker = breaker(1, Duration::from_millis(1));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(breaker.call(|| Err::<(), _>("still down")), Err(CircuitError::Inner("still down")));
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());
    }

    #[test]
    fn uncounted_errors_leave_state_alone() {
        let breaker = breaker(1, Duration::from_secs(60));
        let result = breaker.call_counting(|| Err::<(), _>("not found"), |_| false);
        assert_eq!(result, Err(CircuitError::Inner("not found")));
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
