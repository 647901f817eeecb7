//! Access keys, endpoint paths and target resolution.
//!
//! An API is addressed with an [`AccessKey`] (`client.api("api")`,
//! `client.api(("api", "2"))`, ...), which resolves the base URL of an
//! [`ApiPath`]. Segments are then appended one at a time with
//! [`ApiPath::join`], and a method terminal such as [`ApiPath::get`] ends the
//! chain with a [`Call`].

use crate::{call::Call, client::Client, config::ClientConfig, Error, Result};
use http::Method;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use url::Url;

const KEYS: [&str; 4] = ["api", "version", "suffix", "base_url"];

/// Selects the API an [`ApiPath`] starts from.
///
/// Usually built through `From` conversions:
///
/// | Input | Shape |
/// |---|---|
/// | `()` | all defaults |
/// | `"api"`, `String` | api name |
/// | `("api", "2")`, `["upload", "1.1", ".json"]`, `Vec<Option<String>>` | positional `api, version, suffix, base_url` |
/// | `HashMap` / `BTreeMap` with keys `api`, `version`, `suffix`, `base_url` | named overrides |
/// | `HashSet` / `BTreeSet` | always rejected |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessKey {
    /// Use the client defaults.
    Default,
    /// An api name with default version, suffix and base URL.
    Name(String),
    /// Up to four positional overrides: api, version, suffix, base URL.
    /// Missing or `None` entries fall back to the defaults.
    Positional(Vec<Option<String>>),
    /// Named overrides.
    Map(BTreeMap<String, String>),
    /// An unordered collection. Rejected, since the order of the overrides
    /// matters.
    Set(Vec<String>),
}

/// Whether an endpoint answers once or streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    /// A single request/response exchange.
    Rest,
    /// A long-lived chunked response.
    Streaming,
}

/// The resolved base of an [`ApiPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase {
    /// The resolved api name.
    pub api: String,
    /// The API version.
    pub version: String,
    /// Suffix appended to endpoint paths.
    pub suffix: String,
    /// The template the base URL was rendered from.
    pub base_url_template: String,
    /// The rendered base URL, without trailing slash.
    pub base_url: String,
    /// Endpoint class selected by the api name.
    pub kind: EndpointKind,
}

/// A fully resolved request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    /// The HTTP method.
    pub method: Method,
    /// The full URL.
    pub url: Url,
    /// The API version.
    pub version: String,
    /// The endpoint suffix.
    pub suffix: String,
    /// The base URL template.
    pub base_url_template: String,
    /// Endpoint class.
    pub kind: EndpointKind,
}

/// Resolves `key` against the client defaults.
///
/// # Errors
///
/// Returns [`Error::InvalidAccessKind`] for set keys, unknown mapping keys,
/// more than four positional overrides and base URL templates with
/// placeholders other than `{api}` and `{version}`.
pub fn resolve(config: &ClientConfig, key: AccessKey) -> Result<ApiBase> {
    let mut values: [Option<String>; 4] = [None, None, None, None];

    match key {
        AccessKey::Default => {}
        AccessKey::Name(api) => values[0] = Some(api),
        AccessKey::Positional(positional) => {
            if positional.len() > KEYS.len() {
                return Err(Error::InvalidAccessKind(format!(
                    "expected at most {} positional values ({}), got {}",
                    KEYS.len(),
                    KEYS.join(", "),
                    positional.len()
                )));
            }
            for (slot, value) in values.iter_mut().zip(positional) {
                *slot = value;
            }
        }
        AccessKey::Map(map) => {
            for (key, value) in map {
                let index = KEYS.iter().position(|k| *k == key).ok_or_else(|| {
                    Error::InvalidAccessKind(format!(
                        "unknown key '{}', expected one of {}",
                        key,
                        KEYS.join(", ")
                    ))
                })?;
                values[index] = Some(value);
            }
        }
        AccessKey::Set(_) => {
            return Err(Error::InvalidAccessKind(
                "cannot use a set to access an api, use a map, a tuple or a list instead"
                    .to_string(),
            ));
        }
    }

    let [api, version, suffix, base_url] = values;
    let api = api.unwrap_or_else(|| config.default_api.clone());
    let version = version.unwrap_or_else(|| config.api_version.clone());
    let suffix = suffix.unwrap_or_else(|| config.suffix.clone());
    let base_url_template = base_url.unwrap_or_else(|| config.base_url.clone());

    let rendered = render_template(&base_url_template, &api, &version)?;
    let kind = if config.streaming_apis.contains(&api) {
        EndpointKind::Streaming
    } else {
        EndpointKind::Rest
    };

    Ok(ApiBase {
        base_url: rendered.trim_end_matches('/').to_string(),
        api,
        version,
        suffix,
        base_url_template,
        kind,
    })
}

/// Substitutes `{api}` and `{version}` in `template`. `{{` and `}}` are
/// literal braces.
fn render_template(template: &str, api: &str, version: &str) -> Result<String> {
    let invalid = |reason: String| {
        Error::InvalidAccessKind(format!("base URL template '{}': {}", template, reason))
    };

    let mut rendered = String::with_capacity(template.len() + api.len() + version.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                rendered.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                rendered.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => return Err(invalid("unclosed '{'".to_string())),
                    }
                }
                match name.as_str() {
                    "api" => rendered.push_str(api),
                    "version" => rendered.push_str(version),
                    other => return Err(invalid(format!("unknown placeholder '{{{}}}'", other))),
                }
            }
            '}' => return Err(invalid("unmatched '}'".to_string())),
            c => rendered.push(c),
        }
    }

    Ok(rendered)
}

/// An endpoint path under construction.
///
/// Every [`join`](Self::join) returns a new path, so a partially built path
/// can be shared and extended in different directions.
///
/// # Examples
///
/// ```no_run
/// use apiary::Client;
///
/// # async fn example() -> Result<(), apiary::Error> {
/// let client = Client::builder().build()?;
/// let statuses = client.api("api")?.join("statuses");
///
/// let timeline = statuses.join("home_timeline").get().param("count", 20);
/// let tweet = statuses.join("show").get().param("id", 20u64);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiPath {
    client: Client,
    base: ApiBase,
    segments: Vec<String>,
}

impl ApiPath {
    pub(crate) fn new(client: Client, base: ApiBase) -> Self {
        Self {
            client,
            base,
            segments: Vec::new(),
        }
    }

    /// Returns a new path extended by one segment.
    pub fn join(&self, segment: impl Into<String>) -> ApiPath {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment.into());
        ApiPath {
            client: self.client.clone(),
            base: self.base.clone(),
            segments,
        }
    }

    /// The resolved base.
    pub fn base(&self) -> &ApiBase {
        &self.base
    }

    /// The appended segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Endpoint class of this path.
    pub fn kind(&self) -> EndpointKind {
        self.base.kind
    }

    /// The URL this path points at: base, segments joined by `/`, suffix.
    pub fn url(&self) -> String {
        let mut url = self.base.base_url.clone();
        for segment in &self.segments {
            url.push('/');
            url.push_str(segment);
        }
        let trimmed = url.trim_end_matches('/').len();
        url.truncate(trimmed);
        url.push_str(&self.base.suffix);
        url
    }

    /// Resolves the target of `method` on this path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the path is not a valid URL.
    pub fn resolve(&self, method: Method) -> Result<TargetDescriptor> {
        Ok(TargetDescriptor {
            method,
            url: Url::parse(&self.url())?,
            version: self.base.version.clone(),
            suffix: self.base.suffix.clone(),
            base_url_template: self.base.base_url_template.clone(),
            kind: self.base.kind,
        })
    }

    /// Ends the chain with `method`.
    pub fn request(&self, method: Method) -> Call {
        Call::new(self.client.clone(), self.resolve(method))
    }

    /// Ends the chain with `GET`.
    pub fn get(&self) -> Call {
        self.request(Method::GET)
    }

    /// Ends the chain with `POST`.
    pub fn post(&self) -> Call {
        self.request(Method::POST)
    }

    /// Ends the chain with `PUT`.
    pub fn put(&self) -> Call {
        self.request(Method::PUT)
    }

    /// Ends the chain with `DELETE`.
    pub fn delete(&self) -> Call {
        self.request(Method::DELETE)
    }

    /// Ends the chain with `PATCH`.
    pub fn patch(&self) -> Call {
        self.request(Method::PATCH)
    }
}

impl fmt::Debug for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiPath")
            .field("url", &self.url())
            .field("kind", &self.base.kind)
            .finish()
    }
}

impl From<()> for AccessKey {
    fn from(_: ()) -> Self {
        AccessKey::Default
    }
}

impl From<&str> for AccessKey {
    fn from(api: &str) -> Self {
        AccessKey::Name(api.to_string())
    }
}

impl From<String> for AccessKey {
    fn from(api: String) -> Self {
        AccessKey::Name(api)
    }
}

impl<A: Into<String>, B: Into<String>> From<(A, B)> for AccessKey {
    fn from((api, version): (A, B)) -> Self {
        AccessKey::Positional(vec![Some(api.into()), Some(version.into())])
    }
}

impl<A: Into<String>, B: Into<String>, C: Into<String>> From<(A, B, C)> for AccessKey {
    fn from((api, version, suffix): (A, B, C)) -> Self {
        AccessKey::Positional(vec![
            Some(api.into()),
            Some(version.into()),
            Some(suffix.into()),
        ])
    }
}

impl<A, B, C, D> From<(A, B, C, D)> for AccessKey
where
    A: Into<String>,
    B: Into<String>,
    C: Into<String>,
    D: Into<String>,
{
    fn from((api, version, suffix, base_url): (A, B, C, D)) -> Self {
        AccessKey::Positional(vec![
            Some(api.into()),
            Some(version.into()),
            Some(suffix.into()),
            Some(base_url.into()),
        ])
    }
}

impl<const N: usize> From<[&str; N]> for AccessKey {
    fn from(values: [&str; N]) -> Self {
        AccessKey::Positional(values.iter().map(|v| Some(v.to_string())).collect())
    }
}

impl From<Vec<&str>> for AccessKey {
    fn from(values: Vec<&str>) -> Self {
        AccessKey::Positional(values.into_iter().map(|v| Some(v.to_string())).collect())
    }
}

impl From<Vec<String>> for AccessKey {
    fn from(values: Vec<String>) -> Self {
        AccessKey::Positional(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<String>>> for AccessKey {
    fn from(values: Vec<Option<String>>) -> Self {
        AccessKey::Positional(values)
    }
}

impl From<Vec<Option<&str>>> for AccessKey {
    fn from(values: Vec<Option<&str>>) -> Self {
        AccessKey::Positional(values.into_iter().map(|v| v.map(str::to_string)).collect())
    }
}

impl<K: Into<String>, V: Into<String>, S> From<HashMap<K, V, S>> for AccessKey {
    fn from(map: HashMap<K, V, S>) -> Self {
        AccessKey::Map(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>> From<BTreeMap<K, V>> for AccessKey {
    fn from(map: BTreeMap<K, V>) -> Self {
        AccessKey::Map(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<T: Into<String>, S> From<HashSet<T, S>> for AccessKey {
    fn from(set: HashSet<T, S>) -> Self {
        AccessKey::Set(set.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<String>> From<BTreeSet<T>> for AccessKey {
    fn from(set: BTreeSet<T>) -> Self {
        AccessKey::Set(set.into_iter().map(Into::into).collect())
    }
}
