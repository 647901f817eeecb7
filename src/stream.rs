//! Long-lived streaming calls.
//!
//! A [`RecordStream`] turns one chunked HTTP response into a sequence of
//! decoded records. It connects lazily on first poll, splits the body on
//! newlines, drops keep-alive blank lines, skips records that fail to decode
//! and reconnects with a doubling backoff when the connection drops or the
//! server fails. Authorization failures and other client errors end it.
//!
//! ```text
//! Idle -> Connecting -> Streaming -> Reconnecting -> Connecting ...
//!             |             |
//!             v             v
//!          Failed         Closed
//! ```

use crate::{
    classify::{classify_status, classify_transport},
    config::StreamConfig,
    engine::RequestEngine,
    request::RequestParams,
    retry::{Backoff, RetryPolicy},
    Error, Result,
};
use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Lifecycle state of a [`RecordStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamState {
    /// Not polled yet.
    Idle = 0,
    /// Opening the connection.
    Connecting = 1,
    /// Reading records.
    Streaming = 2,
    /// Waiting before the next connect.
    Reconnecting = 3,
    /// Closed by the caller.
    Closed = 4,
    /// Ended by a non-recoverable error.
    Failed = 5,
}

impl StreamState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => StreamState::Connecting,
            2 => StreamState::Streaming,
            3 => StreamState::Reconnecting,
            4 => StreamState::Closed,
            5 => StreamState::Failed,
            _ => StreamState::Idle,
        }
    }
}

/// Opens streaming connections.
#[derive(Clone)]
pub struct StreamEngine {
    engine: RequestEngine,
    config: StreamConfig,
    policy: RetryPolicy,
}

impl StreamEngine {
    /// Creates a stream engine that connects with `engine` and retries
    /// connect attempts with `policy`.
    pub fn new(engine: RequestEngine, config: StreamConfig, policy: RetryPolicy) -> Self {
        Self {
            engine,
            config,
            policy,
        }
    }

    /// The stream settings.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Returns a copy of this engine retrying connects with `policy`.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            engine: self.engine.clone(),
            config: self.config.clone(),
            policy,
        }
    }

    /// Returns a stream of the records sent in response to `params`.
    ///
    /// Nothing is sent until the stream is polled.
    pub fn open(&self, params: RequestParams) -> RecordStream {
        RecordStream::new(self.clone(), params)
    }

    /// Opens one connection and checks its status.
    async fn connect(&self, params: &RequestParams) -> Result<reqwest::Response> {
        let attempt = async {
            tracing::debug!(
                method = %params.method,
                url = %params.url,
                "Opening stream"
            );

            let response = self
                .engine
                .build_request(params)?
                .send()
                .await
                .map_err(classify_transport)?;

            let status = response.status();
            if status.is_success() {
                tracing::info!(status = status.as_u16(), url = %params.url, "Stream connected");
                return Ok(response);
            }

            let headers = response.headers().clone();
            let raw_response = response.text().await.unwrap_or_default();
            Err(classify_status(status, headers, raw_response))
        };

        match tokio::time::timeout(self.config.connect_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(url = %params.url, "Stream connect timed out");
                Err(Error::Timeout)
            }
        }
    }
}

impl std::fmt::Debug for StreamEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEngine")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Read-only view of the cursor, shared with the [`RecordStream`] handle.
#[derive(Debug, Default)]
struct StreamStatus {
    state: AtomicU8,
    reconnects: AtomicUsize,
    backoff_nanos: AtomicU64,
}

impl StreamStatus {
    fn new(backoff: Duration) -> Self {
        let status = Self::default();
        status.set_backoff(backoff);
        status
    }

    fn set_state(&self, state: StreamState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    fn set_backoff(&self, backoff: Duration) {
        let nanos = u64::try_from(backoff.as_nanos()).unwrap_or(u64::MAX);
        self.backoff_nanos.store(nanos, Ordering::Relaxed);
    }
}

/// Splits a chunked body into lines.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Appends `chunk` and returns the complete, non-blank lines it finished.
    fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=end).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            // keep-alive
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            lines.push(line);
        }
        lines
    }

    /// Takes the bytes left after the last newline once the body has ended.
    /// Returns `None` if they are blank.
    fn finish(&mut self) -> Option<Vec<u8>> {
        let mut line = std::mem::take(&mut self.pending);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        Some(line)
    }

    fn clear(&mut self) {
        self.pending.clear();
    }
}

/// State of one open stream: partial line, backoff and reconnect count.
#[derive(Debug)]
struct StreamCursor {
    buffer: LineBuffer,
    backoff: Backoff,
    reconnects: usize,
    status: Arc<StreamStatus>,
}

impl StreamCursor {
    fn new(config: &StreamConfig, status: Arc<StreamStatus>) -> Self {
        Self {
            buffer: LineBuffer::default(),
            backoff: Backoff::new(config.initial_backoff, config.max_backoff, config.jitter),
            reconnects: 0,
            status,
        }
    }

    fn transition(&self, state: StreamState) {
        self.status.set_state(state);
    }

    fn connected(&mut self) {
        self.backoff.reset();
        self.status.set_backoff(self.backoff.current());
        self.transition(StreamState::Streaming);
    }

    /// Drops any partial line and returns how long to wait before the next
    /// connect. The backoff doubles for the attempt after that.
    fn dropped(&mut self) -> Duration {
        self.buffer.clear();
        let delay = self.backoff.next_delay();
        self.reconnects += 1;
        self.status.set_backoff(self.backoff.current());
        self.status.reconnects.store(self.reconnects, Ordering::Relaxed);
        self.transition(StreamState::Reconnecting);
        delay
    }
}

type Records = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

fn records(engine: StreamEngine, params: RequestParams, status: Arc<StreamStatus>) -> Records {
    Box::pin(stream! {
        let mut cursor = StreamCursor::new(&engine.config, status);
        let engine = &engine;
        let params = &params;

        loop {
            cursor.transition(StreamState::Connecting);
            let response = match engine.policy.run(move || engine.connect(params)).await {
                Ok(response) => response,
                Err(e) if e.is_reconnectable() => {
                    let delay = cursor.dropped();
                    tracing::warn!(
                        error = %e,
                        delay_ms = delay.as_millis(),
                        reconnects = cursor.reconnects,
                        "Stream connect failed, reconnecting"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, url = %params.url, "Stream failed");
                    cursor.transition(StreamState::Failed);
                    yield Err(e);
                    return;
                }
            };

            cursor.connected();
            let mut body = response.bytes_stream();

            loop {
                let next = match engine.config.idle_timeout {
                    Some(idle) => match tokio::time::timeout(idle, body.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            tracing::warn!(
                                idle_secs = idle.as_secs(),
                                "Stream idle for too long, reconnecting"
                            );
                            break;
                        }
                    },
                    None => body.next().await,
                };

                let (lines, ended) = match next {
                    Some(Ok(chunk)) => (cursor.buffer.push(&chunk), false),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Stream connection dropped");
                        break;
                    }
                    None => {
                        tracing::info!(url = %params.url, "Stream ended by server");
                        // end of body terminates the last record
                        (cursor.buffer.finish().into_iter().collect(), true)
                    }
                };

                for line in lines {
                    match engine.engine.decoder().decode(&line) {
                        Ok(record) => yield Ok(record),
                        Err(e) => tracing::warn!(
                            error = %e,
                            record = %String::from_utf8_lossy(&line),
                            "Skipping malformed record"
                        ),
                    }
                }

                if ended {
                    break;
                }
            }

            drop(body);
            let delay = cursor.dropped();
            tracing::info!(
                delay_ms = delay.as_millis(),
                reconnects = cursor.reconnects,
                "Reconnecting stream"
            );
            tokio::time::sleep(delay).await;
        }
    })
}

/// A lazy, reconnecting sequence of decoded records.
///
/// Each item is a decoded record, or the error that ended the stream. A
/// stream yields at most one error and ends right after it.
///
/// Dropping the stream, or calling [`close`](Self::close), releases the
/// connection and cancels any pending reconnect. [`reopen`](Self::reopen)
/// starts over with a fresh connection.
///
/// # Examples
///
/// ```no_run
/// use apiary::Client;
/// use futures::StreamExt;
///
/// # async fn example() -> Result<(), apiary::Error> {
/// let client = Client::builder().build()?;
/// let mut sample = client
///     .api("stream")?
///     .join("statuses")
///     .join("sample")
///     .get()
///     .stream()?;
///
/// while let Some(record) = sample.next().await {
///     println!("{}", record?["text"]);
/// }
/// # Ok(())
/// # }
/// ```
pub struct RecordStream {
    engine: StreamEngine,
    params: RequestParams,
    status: Arc<StreamStatus>,
    inner: Option<Records>,
}

impl RecordStream {
    fn new(engine: StreamEngine, params: RequestParams) -> Self {
        let status = Arc::new(StreamStatus::new(engine.config.initial_backoff));
        let inner = records(engine.clone(), params.clone(), status.clone());
        Self {
            engine,
            params,
            status,
            inner: Some(inner),
        }
    }

    /// The parameters the stream connects with.
    pub fn request(&self) -> &RequestParams {
        &self.params
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        StreamState::from_u8(self.status.state.load(Ordering::Relaxed))
    }

    /// Number of reconnects since the stream was opened.
    pub fn reconnects(&self) -> usize {
        self.status.reconnects.load(Ordering::Relaxed)
    }

    /// The delay the next reconnect would wait, before jitter.
    pub fn backoff(&self) -> Duration {
        Duration::from_nanos(self.status.backoff_nanos.load(Ordering::Relaxed))
    }

    /// Closes the connection. Later polls yield `None`.
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            tracing::debug!(url = %self.params.url, "Stream closed");
        }
        self.status.set_state(StreamState::Closed);
    }

    /// Discards the current connection and starts over from `Idle`.
    pub fn reopen(&mut self) {
        self.status = Arc::new(StreamStatus::new(self.engine.config.initial_backoff));
        self.inner = Some(records(
            self.engine.clone(),
            self.params.clone(),
            self.status.clone(),
        ));
    }
}

impl Stream for RecordStream {
    type Item = Result<Value>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };

        let poll = inner.as_mut().poll_next(cx);
        if let Poll::Ready(None) = poll {
            self.inner = None;
        }
        poll
    }
}

impl std::fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream")
            .field("url", &self.params.url.as_str())
            .field("state", &self.state())
            .field("reconnects", &self.reconnects())
            .finish()
    }
}
