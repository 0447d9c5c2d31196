//! Identifier types shared across the workspace.
//!
//! Login tokens use ULID (Universally Unique Lexicographically Sortable
//! Identifier) format, which gives 80 bits of randomness per token.
//! Session keys are opaque strings chosen by the transport (a chat id or a
//! cookie value), so they are not constrained to any format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to generate a strongly-typed ID wrapper around ULID.
///
/// The wire form is `<prefix>_<ulid>`; parsing also accepts a bare ULID.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a new ID with a randomly generated ULID.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Creates an ID from a ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the prefix used for display formatting.
            #[must_use]
            pub const fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let prefix_with_underscore = concat!($prefix, "_");
                let ulid_str = s.strip_prefix(prefix_with_underscore).unwrap_or(s);

                Ulid::from_str(ulid_str)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        reason: e.to_string(),
                    })
            }
        }

        // Serialized in display form so the relay sees the same string the
        // store holds.
        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }

        impl From<Ulid> for $name {
            fn from(ulid: Ulid) -> Self {
                Self(ulid)
            }
        }
    };
}

define_id!(
    /// One-time correlation identifier for a pending provider login.
    ///
    /// A fresh token is issued for every login attempt; the relay reports
    /// completion against it.
    LoginToken,
    "login"
);

/// Identity of one end-user session.
///
/// For chat transports this is the chat id; for the web front it is the
/// value of the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Creates a session key from a transport-provided identity.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh random session key (used for new web sessions).
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Returns the session key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the store key for this session under the given prefix.
    #[must_use]
    pub fn storage_key(&self, prefix: &str) -> String {
        format!("{prefix}:{}", self.0)
    }

    /// Recovers a session key from a store key, if it carries the prefix.
    #[must_use]
    pub fn from_storage_key(prefix: &str, key: &str) -> Option<Self> {
        key.strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(':'))
            .filter(|rest| !rest.is_empty())
            .map(Self::new)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<i64> for SessionKey {
    fn from(chat_id: i64) -> Self {
        Self(chat_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_token_display_format() {
        let token = LoginToken::new();
        assert!(token.to_string().starts_with("login_"));
    }

    #[test]
    fn login_tokens_are_unique() {
        assert_ne!(LoginToken::new(), LoginToken::new());
    }

    #[test]
    fn parse_with_prefix() {
        let token = LoginToken::new();
        let parsed: LoginToken = token.to_string().parse().expect("should parse");
        assert_eq!(token, parsed);
    }

    #[test]
    fn parse_without_prefix() {
        let ulid = Ulid::new();
        let token: LoginToken = ulid.to_string().parse().expect("should parse");
        assert_eq!(token.as_ulid(), ulid);
    }

    #[test]
    fn parse_invalid_ulid() {
        let err = "login_nope".parse::<LoginToken>().unwrap_err();
        assert_eq!(err.id_type, "LoginToken");
    }

    #[test]
    fn login_token_serializes_in_display_form() {
        let token = LoginToken::new();
        let json = serde_json::to_string(&token).expect("serialize");
        assert_eq!(json, format!("\"{token}\""));
        let back: LoginToken = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, token);
    }

    #[test]
    fn session_key_storage_key_round_trip() {
        let key = SessionKey::from(123_456_i64);
        let stored = key.storage_key("session");
        assert_eq!(stored, "session:123456");
        assert_eq!(SessionKey::from_storage_key("session", &stored), Some(key));
    }

    #[test]
    fn session_key_rejects_foreign_prefix() {
        assert_eq!(SessionKey::from_storage_key("session", "other:1"), None);
        assert_eq!(SessionKey::from_storage_key("session", "session:"), None);
        assert_eq!(SessionKey::from_storage_key("session", "sessionx:1"), None);
    }

    #[test]
    fn generated_session_keys_differ() {
        assert_ne!(SessionKey::generate(), SessionKey::generate());
    }
}
