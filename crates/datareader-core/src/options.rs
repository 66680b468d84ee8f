//! Client configuration shared by every reader.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for the HTTP layer of a reader.
///
/// Constructed once per reader and never mutated afterwards. Every field is
/// optional when deserialized; missing fields take the documented defaults
/// (30s timeout, 3 retries, 1s base delay, no rate limit, no cache).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base retry delay; attempt `n` waits `retry_delay * (n + 1)`.
    pub retry_delay: Duration,
    /// Requests per second. `0` disables rate limiting.
    pub rate_limit: f64,
    /// Token bucket capacity used with `rate_limit`.
    pub rate_burst: u32,
    /// Directory of the on-disk response cache. `None` disables caching.
    pub cache_dir: Option<PathBuf>,
    /// Lifetime of cached responses. Zero means entries never expire.
    pub cache_ttl: Duration,
    /// API key or bearer token, passed to the provider verbatim.
    pub api_key: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            rate_limit: 0.0,
            rate_burst: 1,
            cache_dir: None,
            cache_ttl: Duration::ZERO,
            api_key: None,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("rate_limit", &self.rate_limit)
            .field("rate_burst", &self.rate_burst)
            .field("cache_dir", &self.cache_dir)
            .field("cache_ttl", &self.cache_ttl)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ClientOptions {
    /// Options with the documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the User-Agent header value.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the retry bound and base delay.
    #[must_use]
    pub const fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Sets the request rate in requests per second and the burst capacity.
    #[must_use]
    pub const fn with_rate_limit(mut self, requests_per_second: f64, burst: u32) -> Self {
        self.rate_limit = requests_per_second;
        self.rate_burst = burst;
        self
    }

    /// Enables the on-disk response cache.
    #[must_use]
    pub fn with_cache(mut self, dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        self.cache_dir = Some(dir.into());
        self.cache_ttl = ttl;
        self
    }

    /// Sets the API key or bearer token.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Returns the configured API key, falling back to the environment variable `var`.
    ///
    /// Empty values are treated as absent.
    #[must_use]
    pub fn resolve_api_key(&self, var: &str) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty())
    }
}
