//! Auth header providers.
//!
//! The client never signs requests itself. It asks an [`AuthProvider`] for
//! the headers to attach and merges them over the caller's headers, so a
//! caller can never replace the `Authorization` header by accident.

use crate::{request::RequestParams, Error, Result};
use http::{header::AUTHORIZATION, HeaderMap, HeaderValue};

/// Supplies the auth headers for a request.
///
/// Implement this for signing schemes such as OAuth1, which need the method,
/// URL and parameters of the request.
pub trait AuthProvider: Send + Sync {
    /// Returns the headers to attach to `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the headers cannot be produced.
    fn authorize(&self, request: &RequestParams) -> Result<HeaderMap>;
}

/// Sends requests without credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl AuthProvider for NoAuth {
    fn authorize(&self, _request: &RequestParams) -> Result<HeaderMap> {
        Ok(HeaderMap::new())
    }
}

/// App-only OAuth2 bearer token.
#[derive(Clone)]
pub struct BearerToken {
    header: HeaderValue,
}

impl BearerToken {
    /// Creates a provider that sends `Authorization: Bearer <token>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the token is not a valid
    /// header value.
    pub fn new(token: impl AsRef<str>) -> Result<Self> {
        let mut header = HeaderValue::try_from(format!("Bearer {}", token.as_ref()))
            .map_err(|e| Error::ConfigurationError(format!("Invalid bearer token: {}", e)))?;
        header.set_sensitive(true);
        Ok(Self { header })
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken").finish_non_exhaustive()
    }
}

impl AuthProvider for BearerToken {
    fn authorize(&self, _request: &RequestParams) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.header.clone());
        Ok(headers)
    }
}

/// Merges auth headers over caller headers.
///
/// Caller headers are kept unless the provider sets the same name, in which
/// case every caller value for that name is replaced.
pub(crate) fn merge_headers(caller: &HeaderMap, auth: HeaderMap) -> HeaderMap {
    let mut merged = caller.clone();
    let mut current = None;
    for (name, value) in auth {
        match name {
            Some(name) => {
                merged.insert(name.clone(), value);
                current = Some(name);
            }
            // further values of the previous name
            None => {
                if let Some(name) = &current {
                    merged.append(name.clone(), value);
                }
            }
        }
    }
    merged
}
