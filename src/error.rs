//! Error types for API calls.
//!
//! Every failure the client can surface is a variant of [`Error`]. HTTP
//! failures are classified by recoverability so the retry policy can decide
//! whether to wait, retry immediately or give up, and they keep the raw
//! response body for diagnostics.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// The main error type for API calls.
///
/// # Examples
///
/// ```no_run
/// use apiary::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder().build()?;
///
/// match client.api("api")?.join("help").join("configuration").get().await {
///     Ok(reply) => println!("{}", reply.into_envelope()?),
///     Err(Error::ClientError { status, raw_response, .. }) => {
///         eprintln!("Rejected with {}: {}", status, raw_response);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The access key used to address an API could not be turned into a URL.
    ///
    /// Raised for set-typed keys (element order is not guaranteed), unknown
    /// mapping keys, too many positional overrides and unresolvable base URL
    /// templates. Never retried.
    #[error("Invalid access: {0}")]
    InvalidAccessKind(String),

    /// The server asked the client to slow down (429, or 420 on streams).
    ///
    /// `reset_in` is how long the server said to wait before the limit resets.
    #[error("Rate limited (status {status}), resets in {}s", reset_in.as_secs())]
    RateLimited {
        /// Time until the rate limit window resets
        reset_in: Duration,
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// The request did not complete within its timeout.
    #[error("Request timed out")]
    Timeout,

    /// The server rejected the request with a 4xx status.
    #[error("Client error {status}: {raw_response}")]
    ClientError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// The server failed with a 5xx status.
    #[error("Server error {status}: {raw_response}")]
    ServerError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// The response could not be understood.
    ///
    /// Either the body failed to decode, or the status was neither a success
    /// nor a client/server error.
    #[error("Malformed response (status {status}): {reason}")]
    Malformed {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// Why the response was rejected
        reason: String,
    },

    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// An invalid URL was produced or provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if the default error handler retries this error.
    ///
    /// Only rate limits and timeouts are retried; everything else may be a
    /// permanent condition.
    ///
    /// # Examples
    ///
    /// ```
    /// use apiary::Error;
    /// use http::StatusCode;
    ///
    /// assert!(Error::Timeout.is_retryable());
    ///
    /// let err = Error::ServerError {
    ///     status: StatusCode::INTERNAL_SERVER_ERROR,
    ///     raw_response: "Server error".to_string(),
    ///     headers: http::HeaderMap::new(),
    /// };
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited { .. } | Error::Timeout)
    }

    /// Returns `true` if a stream should reconnect after this error instead
    /// of failing.
    pub(crate) fn is_reconnectable(&self) -> bool {
        matches!(self, Error::ServerError { .. } | Error::Network(_))
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::RateLimited { status, .. }
            | Error::ClientError { status, .. }
            | Error::ServerError { status, .. }
            | Error::Malformed { status, .. } => Some(*status),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::RateLimited { raw_response, .. }
            | Error::ClientError { raw_response, .. }
            | Error::ServerError { raw_response, .. }
            | Error::Malformed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns the time until the rate limit resets, for `RateLimited` errors.
    pub fn reset_in(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { reset_in, .. } => Some(*reset_in),
            _ => None,
        }
    }
}

/// A specialized `Result` type for API calls.
pub type Result<T> = std::result::Result<T, Error>;
