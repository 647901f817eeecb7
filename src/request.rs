//! Per-call request parameters.

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Timeout applied to a single request attempt unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to send one HTTP request.
///
/// A copy of these parameters is echoed back in every
/// [`Envelope`](crate::Envelope) so a call can be inspected or replayed.
#[derive(Debug, Clone)]
pub struct RequestParams {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The fully resolved URL, without query parameters.
    pub url: Url,

    /// Caller headers. Auth headers are merged over these when sent.
    pub headers: HeaderMap,

    /// Query parameters, in insertion order.
    pub query: Vec<(String, String)>,

    /// Optional request body.
    pub body: Option<Body>,

    /// Timeout for one attempt.
    pub timeout: Duration,

    /// Force (`Some(true)`) or disable (`Some(false)`) JSON decoding. With
    /// `None` the body is decoded as JSON when the URL ends with the JSON
    /// suffix.
    pub json: Option<bool>,
}

/// A request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    /// A JSON document.
    Json(Value),
}

impl RequestParams {
    /// Creates parameters for `method` on `url` with the default timeout.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
            json: None,
        }
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Self {
        self.query.push((key.into(), value.into().0));
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the timeout of a single attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides JSON decoding of the response.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = Some(json);
        self
    }

    /// Returns `true` if the response body should go through the decoder.
    pub(crate) fn decodes_json(&self, suffix: &str) -> bool {
        match self.json {
            Some(json) => json,
            None => !suffix.is_empty() && self.url.path().ends_with(suffix),
        }
    }
}

/// A request parameter value, rendered the way the API expects.
///
/// Booleans become `true`/`false` and lists are joined with commas.
///
/// # Examples
///
/// ```
/// use apiary::ParamValue;
///
/// assert_eq!(ParamValue::from(true).as_str(), "true");
/// assert_eq!(ParamValue::list([1, 2, 3]).as_str(), "1,2,3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamValue(String);

impl ParamValue {
    /// Joins several values with commas.
    pub fn list<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        let joined = values
            .into_iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self(joined)
    }

    /// Returns the rendered value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self(if value { "true" } else { "false" }.to_string())
    }
}

macro_rules! param_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

param_from_number!(i32, i64, u32, u64, usize, f64);

impl<T: fmt::Display> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        Self::list(values)
    }
}

impl<T: fmt::Display> From<&[T]> for ParamValue {
    fn from(values: &[T]) -> Self {
        Self::list(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(url: &str) -> RequestParams {
        RequestParams::new(Method::GET, Url::parse(url).unwrap())
    }

    #[test]
    fn test_defaults() {
        let params = params("https://api.example.com/1.1/help/configuration.json");
        assert_eq!(params.timeout, Duration::from_secs(10));
        assert_eq!(params.json, None);
        assert!(params.body.is_none());
    }

    #[test]
    fn test_json_decision() {
        let json_url = params("https://api.example.com/1.1/statuses/show.json");
        assert!(json_url.decodes_json(".json"));
        assert!(!json_url.clone().with_json(false).decodes_json(".json"));

        let text_url = params("https://api.example.com/robots.txt");
        assert!(!text_url.decodes_json(".json"));
        assert!(text_url.clone().with_json(true).decodes_json(".json"));
        assert!(!text_url.decodes_json(""));
    }

    #[test]
    fn test_param_rendering() {
        assert_eq!(ParamValue::from(false).as_str(), "false");
        assert_eq!(ParamValue::from(vec!["a", "b"]).as_str(), "a,b");
        assert_eq!(ParamValue::from(42u64).as_str(), "42");

        let params = params("https://api.example.com/x.json")
            .with_query_param("count", 5u32)
            .with_query_param("trim_user", true);
        assert_eq!(
            params.query,
            vec![
                ("count".to_string(), "5".to_string()),
                ("trim_user".to_string(), "true".to_string())
            ]
        );
    }

    #[test]
    fn test_invalid_header_is_configuration_error() {
        let result = params("https://api.example.com/x.json").with_header("bad header", "v");
        assert!(matches!(result, Err(crate::Error::ConfigurationError(_))));
    }
}
