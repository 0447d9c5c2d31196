//! Polling configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cadence and bounds of the background sweeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between login-completion sweeps.
    #[serde(default = "default_login_interval_seconds")]
    pub login_interval_seconds: u64,

    /// Seconds between notification sweeps.
    #[serde(default = "default_notification_interval_seconds")]
    pub notification_interval_seconds: u64,

    /// Upper bound on sessions examined per sweep.
    #[serde(default = "default_max_sessions_per_sweep")]
    pub max_sessions_per_sweep: usize,

    /// Sessions processed concurrently within one sweep.
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,
}

fn default_login_interval_seconds() -> u64 {
    10
}

fn default_notification_interval_seconds() -> u64 {
    30
}

fn default_max_sessions_per_sweep() -> usize {
    1000
}

fn default_sweep_concurrency() -> usize {
    8
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            login_interval_seconds: default_login_interval_seconds(),
            notification_interval_seconds: default_notification_interval_seconds(),
            max_sessions_per_sweep: default_max_sessions_per_sweep(),
            sweep_concurrency: default_sweep_concurrency(),
        }
    }
}

impl PollingConfig {
    /// Period of the login-completion sweep.
    #[must_use]
    pub fn login_interval(&self) -> Duration {
        Duration::from_secs(self.login_interval_seconds.max(1))
    }

    /// Period of the notification sweep.
    #[must_use]
    pub fn notification_interval(&self) -> Duration {
        Duration::from_secs(self.notification_interval_seconds.max(1))
    }

    /// Concurrency bound, never below one.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.sweep_concurrency.max(1)
    }
}
