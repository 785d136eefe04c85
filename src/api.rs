//! Remote-service interaction with exponential backoff retry logic.
//!
//! Both external collaborators (translation and categorization) are reached
//! through the same small seam so they share one retry policy.
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining one async request/response exchange
//! - [`LlmAsk`]: Wraps the `awful_aj` library's `ask` function
//! - [`Throttled`]: Decorator that takes a slot from a shared [`Throttle`] and
//!   bounds each call with a timeout
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! - Bounded retry attempts (configurable)
//! - Exponential backoff from a base delay, capped at 30 seconds
//! - Random jitter (up to the base delay, at most 250ms) added to prevent
//!   thundering herd

use crate::throttle::Throttle;
use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{error, instrument, warn};

/// Boxed error returned across the remote-call seam.
pub type BoxError = Box<dyn Error>;

/// Trait for one async exchange with a remote service.
///
/// Implementors send text and receive a response. This abstraction allows
/// different backends, test doubles, and decorators (like retry logic).
pub trait AskAsync {
    /// The type of response returned by the service.
    type Response;

    /// Send text to the service and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, BoxError>;
}

impl<T: AskAsync> AskAsync for &T {
    type Response = T::Response;

    async fn ask(&self, text: &str) -> Result<Self::Response, BoxError> {
        (**self).ask(text).await
    }
}

/// Delay before retry number `attempt` (1-based), without jitter.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay)
/// ```
pub fn backoff_delay(attempt: usize, base_delay: StdDuration, max_delay: StdDuration) -> StdDuration {
    let exponent = attempt.saturating_sub(1).min(16) as u32;
    base_delay.saturating_mul(1 << exponent).min(max_delay)
}

/// One throttled, time-limited call to the wrapped service.
///
/// The timeout starts once the throttle slot is held, so time spent queueing
/// behind other workers never counts against the request.
pub struct Throttled<'a, T> {
    inner: T,
    throttle: &'a Throttle,
    request_timeout: StdDuration,
}

impl<'a, T: AskAsync> Throttled<'a, T> {
    pub fn new(inner: T, throttle: &'a Throttle, request_timeout: StdDuration) -> Self {
        Self {
            inner,
            throttle,
            request_timeout,
        }
    }
}

impl<T: AskAsync> AskAsync for Throttled<'_, T> {
    type Response = T::Response;

    async fn ask(&self, text: &str) -> Result<Self::Response, BoxError> {
        let _permit = self.throttle.acquire().await;
        match timeout(self.request_timeout, self.inner.ask(text)).await {
            Ok(res) => res,
            Err(_) => Err(format!("request timed out after {:?}", self.request_timeout).into()),
        }
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
pub struct RetryAsk<T> {
    /// The underlying client to wrap.
    inner: T,
    /// Maximum number of retries after the first attempt.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
    /// Upper bound of the random jitter added to each delay.
    max_jitter: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// ```ignore
    /// let throttled = Throttled::new(client, &throttle, Duration::from_secs(60));
    /// let retry_client = RetryAsk::new(throttled, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
            max_jitter: base_delay.min(StdDuration::from_millis(250)),
        }
    }

    /// Total attempts this wrapper will make before giving up.
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, BoxError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = backoff_delay(attempt, self.base_delay, self.max_delay);
                    let jitter_ms = rng().random_range(0..=self.max_jitter.as_millis() as u64);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Wrapper around `awful_aj::api::ask` that implements [`AskAsync`].
///
/// The chat template carries the system prompt; `text` becomes the user turn.
pub struct LlmAsk {
    /// LLM configuration (API keys, endpoints, model settings).
    pub config: AwfulJadeConfig,
    /// Chat template defining the conversation structure.
    pub template: ChatTemplate,
}

impl fmt::Debug for LlmAsk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmAsk").finish_non_exhaustive()
    }
}

impl AskAsync for LlmAsk {
    type Response = String;

    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, BoxError> {
        let t0 = Instant::now();
        let res = ask(&self.config, text.to_string(), &self.template, None, None).await;
        let dt = t0.elapsed();

        match &res {
            Ok(_) => {}
            Err(e) => warn!(elapsed_ms = dt.as_millis(), error = %e, "LLM call failed"),
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails `failures` times, then echoes the input.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl AskAsync for Flaky {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, BoxError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(format!("transient failure {n}").into())
            } else {
                Ok(text.to_string())
            }
        }
    }

    struct Slow;

    impl AskAsync for Slow {
        type Response = String;

        async fn ask(&self, _text: &str) -> Result<String, BoxError> {
            sleep(StdDuration::from_secs(10)).await;
            Ok("late".into())
        }
    }

    fn quick<T: AskAsync>(inner: T, max_retries: usize) -> RetryAsk<T> {
        RetryAsk::new(inner, max_retries, StdDuration::from_millis(1))
    }

    #[test]
    fn test_backoff_progression() {
        let base = StdDuration::from_secs(1);
        let cap = StdDuration::from_secs(30);
        assert_eq!(backoff_delay(1, base, cap), StdDuration::from_secs(1));
        assert_eq!(backoff_delay(2, base, cap), StdDuration::from_secs(2));
        assert_eq!(backoff_delay(5, base, cap), StdDuration::from_secs(16));
        assert_eq!(backoff_delay(6, base, cap), cap);
        assert_eq!(backoff_delay(500, base, cap), cap);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let api = quick(
            Flaky {
                failures: 2,
                calls: AtomicUsize::new(0),
            },
            3,
        );
        let res = api.ask("hello").await.unwrap();
        assert_eq!(res, "hello");
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_bound() {
        let api = quick(
            Flaky {
                failures: usize::MAX,
                calls: AtomicUsize::new(0),
            },
            2,
        );
        assert!(api.ask("hello").await.is_err());
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), api.max_attempts());
    }

    #[tokio::test]
    async fn test_throttled_timeout_counts_as_failure() {
        let throttle = Throttle::new("test", 1, None);
        let api = quick(Throttled::new(Slow, &throttle, StdDuration::from_millis(20)), 1);
        let err = api.ask("x").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(throttle.available(), 1);
    }
}
