//! The end of an access chain: one request, ready to be sent.

use crate::{
    client::Client,
    path::{EndpointKind, TargetDescriptor},
    request::{Body, ParamValue, RequestParams},
    response::Envelope,
    stream::RecordStream,
    Error, Result,
};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::time::Duration;

/// A request built from an [`ApiPath`](crate::ApiPath) and a method.
///
/// Parameters go in the query string for `GET`, `DELETE` and `HEAD`, and in
/// a form body otherwise, unless a JSON body is set. Errors in the builder
/// (bad header names, unserializable bodies, invalid URLs) are reported when
/// the call is sent.
///
/// Awaiting a `Call` sends it with [`send`](Self::send).
///
/// # Examples
///
/// ```no_run
/// use apiary::Client;
///
/// # async fn example() -> Result<(), apiary::Error> {
/// let client = Client::builder().build()?;
///
/// let tweets = client
///     .api("api")?
///     .join("statuses")
///     .join("user_timeline")
///     .get()
///     .param("screen_name", "rustlang")
///     .param("exclude_replies", true)
///     .fetch()
///     .await?;
///
/// for tweet in &tweets {
///     println!("{}", tweet["text"]);
/// }
/// # Ok(())
/// # }
/// ```
#[must_use = "a call does nothing until it is sent"]
pub struct Call {
    client: Client,
    target: Result<TargetDescriptor>,
    headers: HeaderMap,
    params: Vec<(String, String)>,
    json_body: Option<serde_json::Value>,
    timeout: Option<Duration>,
    json: Option<bool>,
    error_handling: Option<bool>,
    error: Option<Error>,
}

/// The outcome of [`Call::send`], depending on the endpoint kind.
pub enum Reply {
    /// A REST endpoint answered.
    Rest(Envelope),
    /// A streaming endpoint was opened.
    Stream(RecordStream),
}

impl Reply {
    /// Returns the envelope of a REST reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] for a streaming reply.
    pub fn into_envelope(self) -> Result<Envelope> {
        match self {
            Reply::Rest(envelope) => Ok(envelope),
            Reply::Stream(_) => Err(Error::ConfigurationError(
                "streaming endpoint has no envelope, use into_stream".to_string(),
            )),
        }
    }

    /// Returns the record stream of a streaming reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] for a REST reply.
    pub fn into_stream(self) -> Result<RecordStream> {
        match self {
            Reply::Stream(stream) => Ok(stream),
            Reply::Rest(_) => Err(Error::ConfigurationError(
                "REST endpoint has no stream, use into_envelope".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Rest(envelope) => f.debug_tuple("Rest").field(envelope).finish(),
            Reply::Stream(stream) => f.debug_tuple("Stream").field(stream).finish(),
        }
    }
}

impl Call {
    pub(crate) fn new(client: Client, target: Result<TargetDescriptor>) -> Self {
        Self {
            client,
            target,
            headers: HeaderMap::new(),
            params: Vec::new(),
            json_body: None,
            timeout: None,
            json: None,
            error_handling: None,
            error: None,
        }
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// The resolved target, or the error that prevented resolving it.
    pub fn target(&self) -> std::result::Result<&TargetDescriptor, &Error> {
        self.target.as_ref()
    }

    /// Adds a header. Headers set here never replace the auth provider's.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)));
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)));
        match (name, value) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            (Err(e), _) | (_, Err(e)) => self.fail(e),
        }
        self
    }

    /// Adds a request parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.push((key.into(), value.into().into_string()));
        self
    }

    /// Adds several request parameters.
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        for (key, value) in params {
            self = self.param(key, value);
        }
        self
    }

    /// Sends `body` as JSON. Parameters then go in the query string.
    pub fn json_body<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.json_body = Some(value),
            Err(e) => self.fail(Error::SerializationFailed(e.to_string())),
        }
        self
    }

    /// Sets the timeout of a single attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Forces (`true`) or disables (`false`) JSON decoding of the response.
    pub fn json(mut self, json: bool) -> Self {
        self.json = Some(json);
        self
    }

    /// Enables or disables the client's retry policy for this call only.
    pub fn error_handling(mut self, enabled: bool) -> Self {
        self.error_handling = Some(enabled);
        self
    }

    fn into_parts(self) -> Result<(Client, EndpointKind, RequestParams, Option<bool>)> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let target = self.target?;

        let mut params = RequestParams::new(target.method.clone(), target.url);
        params.timeout = self.timeout.unwrap_or(self.client.timeout());
        params.json = self.json;

        let mut headers = self.client.default_headers().clone();
        for (name, value) in self.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        params.headers = headers;

        let in_query = matches!(target.method, Method::GET | Method::DELETE | Method::HEAD)
            || self.json_body.is_some();
        if in_query {
            params.query = self.params;
        } else if !self.params.is_empty() {
            params.body = Some(Body::Form(self.params));
        }
        if let Some(value) = self.json_body {
            params.body = Some(Body::Json(value));
        }

        Ok((self.client, target.kind, params, self.error_handling))
    }

    /// Sends the call through the engine its endpoint kind selects.
    ///
    /// REST endpoints are executed now. Streaming endpoints return a lazy
    /// [`RecordStream`] that connects on first poll.
    ///
    /// # Errors
    ///
    /// Returns the final, non-retried error of a REST call, or a builder error.
    pub async fn send(self) -> Result<Reply> {
        let (client, kind, params, error_handling) = self.into_parts()?;
        match kind {
            EndpointKind::Rest => client
                .execute(params, error_handling)
                .await
                .map(Reply::Rest),
            EndpointKind::Streaming => {
                Ok(Reply::Stream(client.open_stream(params, error_handling)))
            }
        }
    }

    /// Executes the call as a REST request, whatever the endpoint kind.
    ///
    /// # Errors
    ///
    /// Returns the final, non-retried error, or a builder error.
    pub async fn fetch(self) -> Result<Envelope> {
        let (client, _, params, error_handling) = self.into_parts()?;
        client.execute(params, error_handling).await
    }

    /// Opens the call as a stream, whatever the endpoint kind.
    ///
    /// # Errors
    ///
    /// Returns a builder error. Connection errors surface through the stream.
    pub fn stream(self) -> Result<RecordStream> {
        let (client, _, params, error_handling) = self.into_parts()?;
        Ok(client.open_stream(params, error_handling))
    }
}

impl IntoFuture for Call {
    type Output = Result<Reply>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.send())
    }
}
