//! Immutable client configuration.

use std::collections::BTreeSet;
use std::time::Duration;

/// Default base URL template. `{api}` and `{version}` are substituted.
pub const DEFAULT_BASE_URL: &str = "https://{api}.twitter.com/{version}";

/// Default API version.
pub const DEFAULT_API_VERSION: &str = "1.1";

/// Default endpoint suffix. Responses of URLs ending with it are decoded as JSON.
pub const DEFAULT_SUFFIX: &str = ".json";

/// Default api used when an access key does not name one.
pub const DEFAULT_API: &str = "api";

/// Subdomains served by streaming endpoints unless configured otherwise.
pub const DEFAULT_STREAMING_APIS: [&str; 3] = ["stream", "userstream", "sitestream"];

/// Settings shared by every call a [`Client`](crate::Client) makes.
///
/// Built once by [`ClientBuilder`](crate::ClientBuilder) and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL template, e.g. `https://{api}.example.com/{version}`.
    pub base_url: String,
    /// API version substituted for `{version}`.
    pub api_version: String,
    /// Suffix appended to every endpoint path.
    pub suffix: String,
    /// Api substituted for `{api}` when none is given.
    pub default_api: String,
    /// Apis whose endpoints return long-lived streams.
    pub streaming_apis: BTreeSet<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            suffix: DEFAULT_SUFFIX.to_string(),
            default_api: DEFAULT_API.to_string(),
            streaming_apis: DEFAULT_STREAMING_APIS
                .iter()
                .map(|api| api.to_string())
                .collect(),
        }
    }
}

/// Connection settings of streaming calls.
///
/// # Examples
///
/// ```
/// use apiary::StreamConfig;
/// use std::time::Duration;
///
/// let config = StreamConfig {
///     initial_backoff: Duration::from_secs(5),
///     ..StreamConfig::default()
/// };
/// assert_eq!(config.max_backoff, Duration::from_secs(320));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// First reconnect delay. Restored after every successful connect.
    pub initial_backoff: Duration,
    /// Upper bound of the doubling reconnect delay.
    pub max_backoff: Duration,
    /// Timeout of a single connect attempt.
    pub connect_timeout: Duration,
    /// A connection that sends nothing, not even keep-alive newlines, for
    /// this long is treated as dropped. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Randomize reconnect delays between 50% and 100% of the interval.
    pub jitter: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(320),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(90)),
            jitter: false,
        }
    }
}
