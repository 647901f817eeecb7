//! # Apiary - dynamic access to hierarchical HTTP APIs
//!
//! Apiary is an async client runtime for REST and streaming HTTP APIs whose
//! endpoints are not enumerated in code. Endpoints are addressed with access
//! chains that are resolved into URLs at call time, requests go through a
//! retry policy that waits out rate limits and retries timeouts, and
//! streaming endpoints become reconnecting streams of decoded records.
//!
//! ## Quick Start
//!
//! ```no_run
//! use apiary::{BearerToken, Client};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), apiary::Error> {
//!     let client = Client::builder()
//!         .auth(BearerToken::new("AAAA...")?)
//!         .build()?;
//!
//!     // GET https://api.twitter.com/1.1/users/show.json?screen_name=rustlang
//!     let user = client
//!         .api("api")?
//!         .join("users")
//!         .join("show")
//!         .get()
//!         .param("screen_name", "rustlang")
//!         .fetch()
//!         .await?;
//!
//!     println!("{} followers", user["followers_count"]);
//!     println!("Served from {}", user.url);
//!     Ok(())
//! }
//! ```
//!
//! ## Addressing APIs
//!
//! [`Client::api`] takes an [`AccessKey`]: an api name, up to four positional
//! overrides (`api`, `version`, `suffix`, `base_url`), a map of those, or
//! `()` for the defaults. The base URL template is rendered with the api and
//! version, then [`ApiPath::join`] appends path segments and a method
//! terminal such as [`ApiPath::get`] produces a [`Call`].
//!
//! Apis listed in the streaming set (`stream`, `userstream` and `sitestream`
//! by default) are streaming endpoints: sending a call to them returns a
//! [`RecordStream`] instead of an [`Envelope`].
//!
//! ## Error Handling
//!
//! Failures are classified into [`Error`] variants. With the default
//! [`RetryPolicy`], rate limits are retried after the server-declared reset
//! plus one second and timeouts are retried immediately, with no limit.
//! Everything else is returned to the caller with the status and raw body:
//!
//! ```no_run
//! use apiary::{Client, Error};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().build()?;
//! match client.api("api")?.join("statuses").join("show").get().param("id", 1).fetch().await {
//!     Ok(tweet) => println!("{}", tweet["text"]),
//!     Err(Error::ClientError { status, raw_response, .. }) => {
//!         eprintln!("HTTP error {}: {}", status, raw_response);
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Retrying can be turned off for a client with
//! [`ClientBuilder::error_handling`] or for one call with
//! [`Call::error_handling`], and replaced with
//! [`ClientBuilder::error_handler`].

pub mod auth;
mod call;
mod classify;
mod client;
pub mod config;
pub mod decode;
pub mod engine;
mod error;
pub mod path;
pub mod rate_limit;
pub mod request;
pub mod response;
pub mod retry;
pub mod stream;

pub use auth::{AuthProvider, BearerToken, NoAuth};
pub use call::{Call, Reply};
pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, StreamConfig};
pub use error::{Error, Result};
pub use path::{AccessKey, ApiPath, EndpointKind, TargetDescriptor};
pub use request::{Body, ParamValue, RequestParams};
pub use response::Envelope;
pub use retry::{ErrorHandler, RetryDecision, RetryPolicy};
pub use stream::{RecordStream, StreamState};
