//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested
//! sections use `__` as separator, e.g. `RELAY__BASE_URL` or
//! `POLLING__LOGIN_INTERVAL_SECONDS`.

use serde::Deserialize;
use std::time::Duration;
use stellvia_platform_access::{BackendConfig, DEFAULT_SKEW_SECONDS};
use stellvia_relay::{Provider, RelayConfig};
use stellvia_scheduler::PollingConfig;
use stellvia_session::SessionStoreConfig;

use crate::error::ServerError;

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the web front listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Redis connection URL for the session store.
    pub redis_url: String,

    /// Comma-separated login providers offered to signed-out users.
    #[serde(default = "default_providers")]
    pub providers: String,

    /// Identity-provider relay.
    pub relay: RelayConfig,

    /// Business-logic service.
    pub backend: BackendConfig,

    /// Session key space and expiry.
    #[serde(default)]
    pub session: SessionStoreConfig,

    /// Cookie settings for the web front.
    #[serde(default)]
    pub web: WebConfig,

    /// Background sweep cadence.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Inbound event queue.
    #[serde(default)]
    pub events: EventLoopConfig,

    /// Seconds past `exp` before an access token counts as expired.
    #[serde(default = "default_token_skew_seconds")]
    pub token_skew_seconds: i64,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_providers() -> String {
    "github,yandex,code".to_string()
}

fn default_token_skew_seconds() -> i64 {
    DEFAULT_SKEW_SECONDS
}

/// Web front configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Name of the cookie carrying the session key.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_cookie_name() -> String {
    "session_id".to_string()
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

/// Event loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EventLoopConfig {
    /// Events buffered before senders wait.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Pause after an event fails on a store error, in seconds.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
}

fn default_queue_capacity() -> usize {
    64
}

fn default_cooldown_seconds() -> u64 {
    5
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

impl EventLoopConfig {
    /// Returns the queue capacity (at least 1).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Returns the cooldown as a `Duration`.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Parses the provider list, dropping blanks and duplicates.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::NoProviders` if nothing is left.
    pub fn providers(&self) -> Result<Vec<Provider>, ServerError> {
        let mut providers: Vec<Provider> = Vec::new();
        for provider in self.providers.split(',').filter_map(|p| p.parse::<Provider>().ok()) {
            if !providers.contains(&provider) {
                providers.push(provider);
            }
        }
        if providers.is_empty() {
            return Err(ServerError::NoProviders);
        }
        Ok(providers)
    }
}
