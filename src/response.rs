//! Response wrapper that delegates to the decoded payload.
//!
//! An [`Envelope`] keeps the decoded body together with the response headers,
//! the resolved URL and the parameters of the request that produced it.
//! Indexing, iteration, length and formatting all forward to the payload, so
//! an envelope can be used as if it were the payload itself.

use crate::{request::RequestParams, Error, Result};
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use url::Url;

/// A successful API response.
///
/// # Examples
///
/// ```no_run
/// use apiary::Client;
///
/// # async fn example() -> Result<(), apiary::Error> {
/// let client = Client::builder().build()?;
/// let config = client
///     .api("api")?
///     .join("help")
///     .join("configuration")
///     .get()
///     .await?
///     .into_envelope()?;
///
/// println!("Short URL length: {}", config["short_url_length"]);
/// println!("Served from {}", config.url);
/// println!("Rate limit left: {:?}", config.header("x-rate-limit-remaining"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Envelope {
    /// The decoded response body.
    ///
    /// A JSON document when the response was decoded, otherwise the body text
    /// as a [`Value::String`].
    pub response: Value,

    /// The response headers.
    pub headers: HeaderMap,

    /// The final URL of the response.
    pub url: Url,

    /// The parameters the request was sent with.
    pub request: RequestParams,
}

impl Envelope {
    /// Creates a new `Envelope`.
    pub fn new(response: Value, headers: HeaderMap, url: Url, request: RequestParams) -> Self {
        Self {
            response,
            headers,
            url,
            request,
        }
    }

    /// Returns a reference to a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Number of elements of an array, entries of an object or characters of
    /// a string. `None` for other payloads.
    pub fn len(&self) -> Option<usize> {
        match &self.response {
            Value::Array(items) => Some(items.len()),
            Value::Object(map) => Some(map.len()),
            Value::String(text) => Some(text.chars().count()),
            _ => None,
        }
    }

    /// Whether the payload is an empty container. `None` when
    /// [`len`](Self::len) is.
    pub fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }

    /// Iterates over the payload: array elements or object values.
    ///
    /// Scalars yield nothing.
    pub fn iter(&self) -> Iter<'_> {
        let inner: Box<dyn Iterator<Item = &Value> + '_> = match &self.response {
            Value::Array(items) => Box::new(items.iter()),
            Value::Object(map) => Box::new(map.values()),
            _ => Box::new(std::iter::empty()),
        };
        Iter { inner }
    }

    /// Deserializes the payload into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the payload does not match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.response).map_err(|e| Error::Malformed {
            status: http::StatusCode::OK,
            raw_response: self.response.to_string(),
            reason: e.to_string(),
        })
    }

    /// Consumes the envelope and returns the payload.
    pub fn into_inner(self) -> Value {
        self.response
    }
}

/// Iterator over an [`Envelope`] payload.
pub struct Iter<'a> {
    inner: Box<dyn Iterator<Item = &'a Value> + 'a>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<'a> IntoIterator for &'a Envelope {
    type Item = &'a Value;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<I: serde_json::value::Index> std::ops::Index<I> for Envelope {
    type Output = Value;

    fn index(&self, index: I) -> &Value {
        &self.response[index]
    }
}

impl AsRef<Value> for Envelope {
    fn as_ref(&self) -> &Value {
        &self.response
    }
}

impl std::ops::Deref for Envelope {
    type Target = Value;

    fn deref(&self) -> &Self::Target {
        &self.response
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.response, f)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.response, f)
    }
}
