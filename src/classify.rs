//! Maps unsuccessful responses and transport failures onto [`Error`] variants.

use crate::{rate_limit::RateLimitInfo, Error};
use http::{HeaderMap, StatusCode};

/// Status used by streaming endpoints to signal a rate limit.
const ENHANCE_YOUR_CALM: u16 = 420;

/// Classifies a non-2xx response.
///
/// 429 and 420 become [`Error::RateLimited`] with the reset delay taken from
/// the response headers, other 4xx become [`Error::ClientError`], 5xx become
/// [`Error::ServerError`] and anything else is [`Error::Malformed`].
pub fn classify_status(status: StatusCode, headers: HeaderMap, raw_response: String) -> Error {
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == ENHANCE_YOUR_CALM {
        let reset_in = RateLimitInfo::from_headers(&headers).reset_in();
        tracing::warn!(
            status = status.as_u16(),
            reset_in_secs = reset_in.as_secs(),
            "Rate limited"
        );
        return Error::RateLimited {
            reset_in,
            status,
            raw_response,
            headers,
        };
    }

    if status.is_client_error() {
        tracing::error!(
            status = status.as_u16(),
            response = %raw_response,
            "Client error (4xx)"
        );
        Error::ClientError {
            status,
            raw_response,
            headers,
        }
    } else if status.is_server_error() {
        tracing::warn!(
            status = status.as_u16(),
            response = %raw_response,
            "Server error (5xx)"
        );
        Error::ServerError {
            status,
            raw_response,
            headers,
        }
    } else {
        Error::Malformed {
            status,
            raw_response,
            reason: format!("unexpected status {}", status),
        }
    }
}

/// Classifies a reqwest failure: timeouts become [`Error::Timeout`], the rest
/// are network errors.
pub fn classify_transport(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(error)
    }
}
