//! Rate limit header parsing.
//!
//! Turns the rate limit headers of a throttled response into the time left
//! until the limit resets, which the retry policy sleeps on.

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unix-timestamp reset headers, most specific first.
const RESET_HEADERS: [&str; 3] = ["x-rate-limit-reset", "x-ratelimit-reset", "ratelimit-reset"];

/// Information extracted from rate limit headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// When the rate limit resets.
    pub reset_at: Option<SystemTime>,

    /// How long to wait before retrying (from Retry-After header).
    pub retry_after: Option<Duration>,

    /// Number of requests remaining in the current window.
    pub remaining: Option<u64>,
}

impl RateLimitInfo {
    /// Extracts rate limit information from HTTP response headers.
    ///
    /// Parses:
    /// - `Retry-After` (seconds or HTTP date)
    /// - `X-Rate-Limit-Reset`, `X-RateLimit-Reset`, `RateLimit-Reset` (Unix timestamp)
    /// - `X-Rate-Limit-Remaining`, `X-RateLimit-Remaining`
    ///
    /// # Examples
    ///
    /// ```
    /// use apiary::rate_limit::RateLimitInfo;
    /// use http::HeaderMap;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("retry-after", "60".parse().unwrap());
    /// headers.insert("x-rate-limit-remaining", "0".parse().unwrap());
    ///
    /// let info = RateLimitInfo::from_headers(&headers);
    /// assert_eq!(info.remaining, Some(0));
    /// assert_eq!(info.reset_in().as_secs(), 60);
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            reset_at: parse_rate_limit_reset(headers),
            retry_after: parse_retry_after(headers),
            remaining: parse_rate_limit_remaining(headers),
        }
    }

    /// Returns how long until the rate limit resets.
    ///
    /// Prefers `retry_after`, then falls back to `reset_at`. A reset time in
    /// the past, or no information at all, gives zero.
    pub fn reset_in(&self) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }

        self.reset_at
            .and_then(|reset_at| reset_at.duration_since(SystemTime::now()).ok())
            .unwrap_or(Duration::ZERO)
    }
}

/// Parses the Retry-After header.
///
/// Supports both delay-seconds (integer) and HTTP-date formats.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get("retry-after")?.to_str().ok()?;

    if let Ok(seconds) = header.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date_time = httpdate::parse_http_date(header).ok()?;
    Some(
        date_time
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO),
    )
}

fn parse_rate_limit_reset(headers: &HeaderMap) -> Option<SystemTime> {
    RESET_HEADERS.iter().find_map(|name| {
        let timestamp = headers.get(*name)?.to_str().ok()?.trim().parse::<u64>().ok()?;
        UNIX_EPOCH.checked_add(Duration::from_secs(timestamp))
    })
}

fn parse_rate_limit_remaining(headers: &HeaderMap) -> Option<u64> {
    ["x-rate-limit-remaining", "x-ratelimit-remaining"]
        .iter()
        .find_map(|name| headers.get(*name)?.to_str().ok()?.trim().parse().ok())
}
