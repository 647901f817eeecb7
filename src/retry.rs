//! Retry policy and reconnect backoff.
//!
//! [`RetryPolicy`] wraps any request-executing operation and re-invokes it
//! while its [`ErrorHandler`] says so. The default handler retries rate
//! limits after the server-declared reset and timeouts immediately, forever.
//! Callers that need a ceiling wrap the whole call in their own timeout.

use crate::Error;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait for the given delay, then invoke the operation again.
    Retry(Duration),
    /// Return the error to the caller.
    Propagate,
}

/// Decides whether a failed attempt is retried.
///
/// # Examples
///
/// ```
/// use apiary::{Error, ErrorHandler, RetryDecision};
/// use std::time::Duration;
///
/// /// Retries server errors a few times, on top of nothing else.
/// struct RetryServerErrors(usize);
///
/// impl ErrorHandler for RetryServerErrors {
///     fn decide(&self, error: &Error, attempt: usize) -> RetryDecision {
///         match error {
///             Error::ServerError { .. } if attempt <= self.0 => {
///                 RetryDecision::Retry(Duration::from_secs(1))
///             }
///             _ => RetryDecision::Propagate,
///         }
///     }
/// }
/// ```
pub trait ErrorHandler: Send + Sync {
    /// Returns the decision for `error`, raised by attempt number `attempt`
    /// (1-indexed).
    fn decide(&self, error: &Error, attempt: usize) -> RetryDecision;
}

/// Retries rate limits after `reset_in + 1s` and timeouts immediately.
/// Everything else propagates.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn decide(&self, error: &Error, _attempt: usize) -> RetryDecision {
        match error {
            Error::RateLimited { reset_in, .. } => {
                RetryDecision::Retry(reset_in.saturating_add(Duration::from_secs(1)))
            }
            Error::Timeout => RetryDecision::Retry(Duration::ZERO),
            _ => RetryDecision::Propagate,
        }
    }
}

/// Re-invokes an operation according to an [`ErrorHandler`].
///
/// # Examples
///
/// ```
/// use apiary::{Error, RetryPolicy};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// # #[tokio::main]
/// # async fn main() {
/// let calls = &AtomicUsize::new(0);
/// let policy = RetryPolicy::default();
///
/// let result = policy
///     .run(move || async move {
///         if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///             Err(Error::Timeout)
///         } else {
///             Ok("done")
///         }
///     })
///     .await;
///
/// assert_eq!(result.unwrap(), "done");
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # }
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    handler: Arc<dyn ErrorHandler>,
    error_handling: bool,
}

impl RetryPolicy {
    /// Creates an enabled policy driven by `handler`.
    pub fn new(handler: Arc<dyn ErrorHandler>) -> Self {
        Self {
            handler,
            error_handling: true,
        }
    }

    /// A policy that runs operations exactly once.
    pub fn disabled() -> Self {
        Self::default().error_handling(false)
    }

    /// Enables or disables retrying.
    ///
    /// When disabled, [`run`](Self::run) invokes the operation once and
    /// returns its result unchanged.
    pub fn error_handling(mut self, enabled: bool) -> Self {
        self.error_handling = enabled;
        self
    }

    /// Returns `true` if failures are handed to the error handler.
    pub fn is_enabled(&self) -> bool {
        self.error_handling
    }

    /// Runs `operation` until it succeeds or the handler gives up.
    ///
    /// # Errors
    ///
    /// Returns the first error the handler decides to propagate.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        if !self.error_handling {
            return operation().await;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            match self.handler.decide(&error, attempt) {
                RetryDecision::Propagate => return Err(error),
                RetryDecision::Retry(delay) => {
                    match &error {
                        Error::RateLimited { .. } => tracing::warn!(
                            error = %error,
                            attempt = attempt,
                            delay_secs = delay.as_secs(),
                            "Rate limit exceeded, sleeping before retry"
                        ),
                        Error::Timeout => tracing::warn!(
                            attempt = attempt,
                            "Request timed out, retrying"
                        ),
                        _ => tracing::warn!(
                            error = %error,
                            attempt = attempt,
                            delay_ms = delay.as_millis(),
                            "Retrying request after delay"
                        ),
                    }

                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Arc::new(DefaultErrorHandler))
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("error_handling", &self.error_handling)
            .finish_non_exhaustive()
    }
}

/// Doubling reconnect delay with a cap.
///
/// [`next_delay`](Self::next_delay) returns the current interval and doubles
/// it for the following call; [`reset`](Self::reset) goes back to the
/// initial interval.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    jitter: bool,
}

impl Backoff {
    /// Creates a backoff starting at `initial` and never exceeding `max`.
    pub fn new(initial: Duration, max: Duration, jitter: bool) -> Self {
        Self {
            initial,
            max,
            current: initial.min(max),
            jitter,
        }
    }

    /// The interval the next [`next_delay`](Self::next_delay) call waits on,
    /// before jitter.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Returns the delay to wait now and doubles the interval.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);

        if self.jitter {
            // Add jitter: random value between 50% and 100% of the delay
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
            delay.mul_f64(jitter_factor)
        } else {
            delay
        }
    }

    /// Goes back to the initial interval.
    pub fn reset(&mut self) {
        self.current = self.initial.min(self.max);
    }
}
