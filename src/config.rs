//! Adapter configuration.

use serde::Deserialize;
use std::time::Duration;

/// Default number of attempts per generation call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
/// Default per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Default artificial latency of the mock adapter.
pub const DEFAULT_MOCK_DELAY: Duration = Duration::from_millis(500);

/// Bounded linear-backoff retry policy.
///
/// Attempt `n` (1-based) that fails with a retryable error is followed by a
/// sleep of `retry_delay * n` before attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base delay, in milliseconds when deserialized.
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and base delay.
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts,
            retry_delay,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }
}

/// Settings used to construct an adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Decrypted provider credential.
    pub api_key: String,
    /// Override of the provider's default API root.
    pub base_url: Option<String>,
    /// Retry budget for generation calls.
    pub retry: RetryPolicy,
    /// Timeout applied to each HTTP request.
    #[serde(rename = "request_timeout_secs", with = "secs")]
    pub request_timeout: Duration,
    /// Artificial latency of the mock adapter.
    #[serde(rename = "mock_delay_ms", with = "millis")]
    pub mock_delay: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            mock_delay: DEFAULT_MOCK_DELAY,
        }
    }
}

impl AdapterConfig {
    /// Creates a config for the given key with default settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Sets the base URL override. Blank values are ignored.
    pub fn with_base_url(mut self, base_url: Option<impl Into<String>>) -> Self {
        self.base_url = base_url
            .map(Into::into)
            .filter(|url: &String| !url.trim().is_empty());
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the mock adapter latency.
    pub fn with_mock_delay(mut self, delay: Duration) -> Self {
        self.mock_delay = delay;
        self
    }

    /// Reads tuning knobs from `BYOKGEN_*` environment variables on top of
    /// the defaults. Unparseable values are ignored.
    pub fn from_env(api_key: impl Into<String>) -> Self {
        let mut config = Self::new(api_key);
        if let Some(n) = env_parse::<u32>("BYOKGEN_MAX_ATTEMPTS") {
            config.retry.max_attempts = n;
        }
        if let Some(ms) = env_parse::<u64>("BYOKGEN_RETRY_DELAY_MS") {
            config.retry.retry_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = env_parse::<u64>("BYOKGEN_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = env_parse::<u64>("BYOKGEN_MOCK_DELAY_MS") {
            config.mock_delay = Duration::from_millis(ms);
        }
        config
    }

    /// Resolves the API root: the override if set, else `default`, without
    /// a trailing slash.
    pub(crate) fn resolve_base_url(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    /// Builds the HTTP client for an adapter.
    pub(crate) fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .unwrap_or_default()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
