//! Session store configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the session store key space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStoreConfig {
    /// Prefix for store keys; records live at `<prefix>:<session key>`.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Expiry applied on every write, in seconds. `0` disables expiry.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_key_prefix() -> String {
    "session".to_string()
}

fn default_ttl_seconds() -> u64 {
    7 * 24 * 60 * 60
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

impl SessionStoreConfig {
    /// Returns the key pattern matching every session record.
    #[must_use]
    pub fn scan_pattern(&self) -> String {
        format!("{}:*", self.key_prefix)
    }

    /// Returns the write TTL, if expiry is enabled.
    #[must_use]
    pub fn ttl(&self) -> Option<u64> {
        (self.ttl_seconds > 0).then_some(self.ttl_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionStoreConfig::default();
        assert_eq!(config.key_prefix, "session");
        assert_eq!(config.ttl(), Some(604_800));
        assert_eq!(config.scan_pattern(), "session:*");
    }

    #[test]
    fn zero_ttl_disables_expiry() {
        let config = SessionStoreConfig {
            ttl_seconds: 0,
            ..Default::default()
        };
        assert_eq!(config.ttl(), None);
    }
}
