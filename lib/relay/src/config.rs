//! Relay client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for the identity-provider relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Base URL of the relay (e.g., "http://auth:8080").
    base_url: String,
    /// Per-request timeout in seconds. Default: 20
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    20
}

impl RelayConfig {
    /// Creates a configuration with the default timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Returns the relay base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Returns the full URL of a relay endpoint.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = RelayConfig::new("http://relay:8080/");
        assert_eq!(config.endpoint("/check-token"), "http://relay:8080/check-token");
        assert_eq!(config.endpoint("refresh"), "http://relay:8080/refresh");
    }

    #[test]
    fn timeout_defaults_to_twenty_seconds() {
        let config: RelayConfig =
            serde_json::from_str(r#"{"base_url": "http://relay"}"#).expect("deserialize");
        assert_eq!(config.timeout(), Duration::from_secs(20));
        assert_eq!(
            config.with_timeout_seconds(3).timeout(),
            Duration::from_secs(3)
        );
    }
}
