//! Execution of single REST requests.

use crate::{
    auth::{merge_headers, AuthProvider},
    classify::{classify_status, classify_transport},
    decode::Decoder,
    request::{Body, RequestParams},
    response::Envelope,
    Error, Result,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Responses of URLs ending with this suffix are decoded unless the request
/// says otherwise.
pub const JSON_SUFFIX: &str = ".json";

/// Turns a [`RequestParams`] into an [`Envelope`] with one HTTP exchange.
///
/// The engine does not retry; [`RetryPolicy`](crate::RetryPolicy) wraps it.
#[derive(Clone)]
pub struct RequestEngine {
    http_client: reqwest::Client,
    auth: Arc<dyn AuthProvider>,
    decoder: Arc<dyn Decoder>,
}

impl RequestEngine {
    /// Creates an engine sending through `http_client`.
    pub fn new(
        http_client: reqwest::Client,
        auth: Arc<dyn AuthProvider>,
        decoder: Arc<dyn Decoder>,
    ) -> Self {
        Self {
            http_client,
            auth,
            decoder,
        }
    }

    /// The decoder applied to response bodies.
    pub fn decoder(&self) -> &Arc<dyn Decoder> {
        &self.decoder
    }

    /// Builds the reqwest request for `params`, with auth headers merged
    /// over the caller's.
    pub(crate) fn build_request(&self, params: &RequestParams) -> Result<reqwest::RequestBuilder> {
        let auth_headers = self.auth.authorize(params)?;
        let headers = merge_headers(&params.headers, auth_headers);

        let mut request = self
            .http_client
            .request(params.method.clone(), params.url.clone())
            .headers(headers);

        if !params.query.is_empty() {
            request = request.query(&params.query);
        }

        match &params.body {
            Some(Body::Form(pairs)) => request = request.form(pairs),
            Some(Body::Json(value)) => request = request.json(value),
            None => {}
        }

        Ok(request)
    }

    /// Executes one attempt of `params` under its timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the exchange, body included, does not
    /// finish in time, a classified error for non-2xx statuses, and
    /// [`Error::Malformed`] if the body cannot be decoded.
    pub async fn execute(&self, params: RequestParams) -> Result<Envelope> {
        match tokio::time::timeout(params.timeout, self.exchange(&params)).await {
            Ok(result) => {
                let (response, headers, url) = result?;
                Ok(Envelope::new(response, headers, url, params))
            }
            Err(_) => {
                tracing::warn!(
                    method = %params.method,
                    url = %params.url,
                    timeout_secs = params.timeout.as_secs_f64(),
                    "Request timed out"
                );
                Err(Error::Timeout)
            }
        }
    }

    async fn exchange(
        &self,
        params: &RequestParams,
    ) -> Result<(Value, http::HeaderMap, url::Url)> {
        let start_time = Instant::now();

        tracing::debug!(
            method = %params.method,
            url = %params.url,
            "Executing HTTP request"
        );

        let response = self
            .build_request(params)?
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();

        tracing::info!(
            status = status.as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            url = %url,
            "Received HTTP response"
        );

        if !status.is_success() {
            let raw_response = response.text().await.unwrap_or_default();
            return Err(classify_status(status, headers, raw_response));
        }

        let content = if params.decodes_json(JSON_SUFFIX) {
            let raw = response.bytes().await.map_err(classify_transport)?;
            self.decoder.decode(&raw).map_err(|e| {
                let raw_response = String::from_utf8_lossy(&raw).into_owned();
                tracing::error!(
                    error = %e,
                    raw_response = %raw_response,
                    "Failed to decode response"
                );
                Error::Malformed {
                    status,
                    raw_response,
                    reason: e.to_string(),
                }
            })?
        } else {
            Value::String(response.text().await.map_err(classify_transport)?)
        };

        Ok((content, headers, url))
    }
}

impl std::fmt::Debug for RequestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestEngine").finish_non_exhaustive()
    }
}
