//! Retry logic with exponential backoff and jitter.

use std::sync::Arc;
use std::time::Duration;

/// Backoff schedule and attempt budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first call included. Zero behaves like one.
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,
    pub max_delay: Duration,
    /// Add uniform jitter of up to 10% of the current delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based: the wait after the first failure is attempt 0).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scale = self.backoff_factor.powi(exponent);
        let seconds = self.initial_delay.as_secs_f64() * scale;
        let delay = if seconds.is_finite() && seconds < self.max_delay.as_secs_f64() {
            Duration::from_secs_f64(seconds.max(0.0))
        } else {
            self.max_delay
        };

        if self.jitter {
            delay + delay.mul_f64(fastrand::f64() * 0.1)
        } else {
            delay
        }
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

/// Blocking wait between attempts; swapped out in tests.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Runs fallible operations under a [`RetryPolicy`].
#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Retrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent. The last error is returned.
    pub fn run<T, E, F, P>(&self, mut operation: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        P: Fn(&E) -> bool,
    {
        let attempts = self.policy.attempts();
        let mut attempt = 0;
        loop {
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let exhausted = attempt + 1 >= attempts;
                    if exhausted || !is_retryable(&error) {
                        return Err(error);
                    }

                    let delay = self.policy.delay_for_attempt(attempt);
                    tracing::debug!(
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "retrying after failure"
                    );
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier").field("policy", &self.policy).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        waits: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.waits.lock().expect("sleeper lock").push(duration);
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            max_delay: Duration::from_millis(300),
            jitter: false,
        }
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = policy(5);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(300));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(300));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let policy = RetryPolicy {
            jitter: true,
            ..policy(3)
        };
        for _ in 0..50 {
            let delay = policy.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(220));
        }
    }

    #[test]
    fn retries_until_success() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let retrier = Retrier::new(policy(3)).with_sleeper(sleeper.clone());

        let result = retrier.run(
            |attempt| if attempt < 2 { Err("flaky") } else { Ok(attempt) },
            |_| true,
        );

        assert_eq!(result, Ok(2));
        assert_eq!(
            *sleeper.waits.lock().expect("sleeper lock"),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[test]
    fn exhausting_attempts_returns_last_error() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let retrier = Retrier::new(policy(3)).with_sleeper(sleeper.clone());

        let result: Result<(), String> =
            retrier.run(|attempt| Err(format!("failure {attempt}")), |_| true);

        assert_eq!(result, Err(String::from("failure 2")));
        assert_eq!(sleeper.waits.lock().expect("sleeper lock").len(), 2);
    }

    #[test]
    fn non_retryable_errors_propagate_immediately() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let retrier = Retrier::new(policy(5)).with_sleeper(sleeper.clone());
        let mut calls = 0;

        let result: Result<(), &str> = retrier.run(
            |_| {
                calls += 1;
                Err("fatal")
            },
            |error| *error != "fatal",
        );

        assert_eq!(result, Err("fatal"));
        assert_eq!(calls, 1);
        assert!(sleeper.waits.lock().expect("sleeper lock").is_empty());
    }

    #[test]
    fn zero_budget_still_calls_once() {
        let retrier = Retrier::new(policy(0));
        let mut calls = 0;
        let _: Result<(), ()> = retrier.run(
            |_| {
                calls += 1;
                Err(())
            },
            |_| true,
        );
        assert_eq!(calls, 1);
    }
}
