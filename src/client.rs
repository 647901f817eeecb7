//! The client and its builder.
//!
//! [`Client`] is the composition root: it owns the immutable configuration,
//! the auth provider, the decoder and the retry policy, and hands out
//! [`ApiPath`]s to address endpoints.

use crate::{
    auth::{AuthProvider, NoAuth},
    config::{ClientConfig, StreamConfig},
    decode::{Decoder, JsonDecoder},
    engine::RequestEngine,
    path::{self, AccessKey, ApiPath},
    request::{RequestParams, DEFAULT_TIMEOUT},
    response::Envelope,
    retry::{DefaultErrorHandler, ErrorHandler, RetryPolicy},
    stream::{RecordStream, StreamEngine},
    Error, Result,
};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Duration;

/// A client for a hierarchical REST and streaming API.
///
/// The client is cheap to clone and designed to be reused: every clone shares
/// the same connection pool and configuration.
///
/// # Examples
///
/// ```no_run
/// use apiary::{BearerToken, Client};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), apiary::Error> {
/// let client = Client::builder()
///     .auth(BearerToken::new("AAAA...")?)
///     .timeout(Duration::from_secs(30))
///     .build()?;
///
/// // https://api.twitter.com/1.1/help/configuration.json
/// let configuration = client
///     .api("api")?
///     .join("help")
///     .join("configuration")
///     .get()
///     .fetch()
///     .await?;
/// println!("{}", configuration["photo_size_limit"]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    default_headers: HeaderMap,
    timeout: Duration,
    engine: RequestEngine,
    stream_engine: StreamEngine,
    policy: RetryPolicy,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The stream configuration.
    pub fn stream_config(&self) -> &StreamConfig {
        self.inner.stream_engine.config()
    }

    /// The retry policy applied to calls.
    pub fn policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    pub(crate) fn default_headers(&self) -> &HeaderMap {
        &self.inner.default_headers
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Starts an access chain at the api selected by `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAccessKind`] if `key` cannot be resolved, see
    /// [`AccessKey`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use apiary::{Client, EndpointKind};
    ///
    /// # fn example() -> Result<(), apiary::Error> {
    /// let client = Client::builder().build()?;
    ///
    /// let rest = client.api("api")?.join("help").join("configuration");
    /// assert_eq!(rest.url(), "https://api.twitter.com/1.1/help/configuration.json");
    ///
    /// let upload = client.api(("upload", "1.1"))?.join("media").join("upload");
    /// assert_eq!(upload.url(), "https://upload.twitter.com/1.1/media/upload.json");
    ///
    /// let stream = client.api("stream")?;
    /// assert_eq!(stream.kind(), EndpointKind::Streaming);
    /// # Ok(())
    /// # }
    /// ```
    pub fn api(&self, key: impl Into<AccessKey>) -> Result<ApiPath> {
        let base = path::resolve(&self.inner.config, key.into())?;
        Ok(ApiPath::new(self.clone(), base))
    }

    fn policy_for(&self, error_handling: Option<bool>) -> RetryPolicy {
        match error_handling {
            Some(enabled) => self.inner.policy.clone().error_handling(enabled),
            None => self.inner.policy.clone(),
        }
    }

    /// Executes a REST request under the client's retry policy.
    ///
    /// # Errors
    ///
    /// Returns the first error the retry policy does not retry.
    pub async fn request(&self, params: RequestParams) -> Result<Envelope> {
        self.execute(params, None).await
    }

    pub(crate) async fn execute(
        &self,
        params: RequestParams,
        error_handling: Option<bool>,
    ) -> Result<Envelope> {
        let engine = &self.inner.engine;
        let params = &params;
        self.policy_for(error_handling)
            .run(move || engine.execute(params.clone()))
            .await
    }

    /// Opens a stream for `params`. Connect attempts run under the client's
    /// retry policy.
    pub fn stream_request(&self, params: RequestParams) -> RecordStream {
        self.open_stream(params, None)
    }

    pub(crate) fn open_stream(
        &self,
        params: RequestParams,
        error_handling: Option<bool>,
    ) -> RecordStream {
        match error_handling {
            Some(_) => self
                .inner
                .stream_engine
                .with_policy(self.policy_for(error_handling))
                .open(params),
            None => self.inner.stream_engine.open(params),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("timeout", &self.inner.timeout)
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use apiary::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), apiary::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://{api}.example.com/v{version}")?
///     .api_version("2")
///     .suffix("")
///     .streaming_apis(["firehose"])
///     .timeout(Duration::from_secs(30))
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    config: ClientConfig,
    stream_config: StreamConfig,
    default_headers: HeaderMap,
    timeout: Duration,
    auth: Arc<dyn AuthProvider>,
    decoder: Arc<dyn Decoder>,
    error_handler: Arc<dyn ErrorHandler>,
    error_handling: bool,
    http_client: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            stream_config: StreamConfig::default(),
            default_headers: HeaderMap::new(),
            timeout: DEFAULT_TIMEOUT,
            auth: Arc::new(NoAuth),
            decoder: Arc::new(JsonDecoder),
            error_handler: Arc::new(DefaultErrorHandler),
            error_handling: true,
            http_client: None,
        }
    }

    /// Sets the base URL template. `{api}` and `{version}` are substituted.
    ///
    /// # Errors
    ///
    /// Returns an error if the template has other placeholders or does not
    /// render to a valid URL.
    pub fn base_url(mut self, template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let probe = ClientConfig {
            base_url: template.clone(),
            ..ClientConfig::default()
        };
        let base = path::resolve(&probe, AccessKey::Default)?;
        url::Url::parse(&base.base_url)?;

        self.config.base_url = template;
        Ok(self)
    }

    /// Sets the default API version.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    /// Sets the default endpoint suffix (`.json` by default).
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.suffix = suffix.into();
        self
    }

    /// Sets the api used when an access key does not name one.
    pub fn default_api(mut self, api: impl Into<String>) -> Self {
        self.config.default_api = api.into();
        self
    }

    /// Replaces the set of apis served by streaming endpoints.
    pub fn streaming_apis<I, S>(mut self, apis: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.streaming_apis = apis.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the stream connection settings.
    pub fn stream_config(mut self, config: StreamConfig) -> Self {
        self.stream_config = config;
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the default timeout of one REST attempt (10 seconds by default).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the auth header provider.
    pub fn auth(mut self, auth: impl AuthProvider + 'static) -> Self {
        self.auth = Arc::new(auth);
        self
    }

    /// Sets the decoder of JSON response bodies and streamed records.
    pub fn decoder(mut self, decoder: impl Decoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Sets the handler deciding which failures are retried.
    pub fn error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }

    /// Enables or disables retrying for all calls. Calls can override it
    /// with [`Call::error_handling`](crate::Call::error_handling).
    pub fn error_handling(mut self, enabled: bool) -> Self {
        self.error_handling = enabled;
        self
    }

    /// Uses an existing reqwest client instead of building one.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn build(self) -> Result<Client> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| {
                    Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
                })?,
        };

        let policy = RetryPolicy::new(self.error_handler).error_handling(self.error_handling);
        let engine = RequestEngine::new(http_client, self.auth, self.decoder);
        let stream_engine = StreamEngine::new(engine.clone(), self.stream_config, policy.clone());

        Ok(Client {
            inner: Arc::new(ClientInner {
                config: self.config,
                default_headers: self.default_headers,
                timeout: self.timeout,
                engine,
                stream_engine,
                policy,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
