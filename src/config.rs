// Client configuration.
// Where the backend lives and how the cache behaves.

use std::time::Duration;

/// Configuration for a [`ResourceClient`](crate::client::ResourceClient).
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the backend service, without a trailing slash.
    pub base_url: String,
    /// How long an unreferenced cache entry survives before it is
    /// eligible for eviction. Prevents cache thrash when a view
    /// unmounts and immediately remounts.
    pub grace_period: Duration,
    /// Per-request timeout applied by the HTTP transport.
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            grace_period: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Config pointing at the given base URL, defaults elsewhere.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}
