//! Configuration for the remote client.

use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the store base URL.
pub const ENV_BASE_URL: &str = "SIMSYNC_BASE_URL";
/// Environment variable holding the bearer token.
pub const ENV_TOKEN: &str = "SIMSYNC_TOKEN";
/// Environment variable holding the pre-token queue timeout, in seconds.
pub const ENV_QUEUE_TIMEOUT: &str = "SIMSYNC_QUEUE_TIMEOUT_SECS";

/// Default number of requests that may wait for a token.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    /// A variable is set to something unusable.
    #[error("invalid value {value:?} for {var}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Configuration for a [`RemoteClient`](crate::RemoteClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Store base URL (e.g. "https://db.example.com/api").
    pub base_url: String,
    /// Bearer token available at construction.
    pub token: Option<String>,
    /// Maximum number of requests waiting for a token.
    pub queue_capacity: usize,
    /// How long a request may wait for a token. `None` waits forever.
    pub queue_timeout: Option<Duration>,
    /// Per-request timeout applied by the HTTP client. `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// User agent sent by the HTTP client.
    pub user_agent: String,
}

impl ClientConfig {
    /// Creates a configuration with no token.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue_timeout: None,
            request_timeout: None,
            user_agent: format!("simsync/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Reads `SIMSYNC_BASE_URL`, `SIMSYNC_TOKEN` and `SIMSYNC_QUEUE_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let base_url = lookup(ENV_BASE_URL).ok_or(ConfigError::Missing(ENV_BASE_URL))?;
        let mut config = Self::new(base_url);

        if let Some(token) = lookup(ENV_TOKEN).filter(|t| !t.is_empty()) {
            config = config.with_token(token);
        }

        if let Some(raw) = lookup(ENV_QUEUE_TIMEOUT) {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                var: ENV_QUEUE_TIMEOUT,
                value: raw.clone(),
            })?;
            config = config.with_queue_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Sets the initial bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the pending queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets how long a request may wait for a token.
    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = Some(timeout);
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
