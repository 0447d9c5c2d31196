//! Error types for relay calls.
//!
//! None of these say anything about the login itself: a provider denial is
//! a successful call returning `CheckState::Denied`. Callers keep session
//! state untouched on any `RelayError` and ask the user to retry.

use std::fmt;

/// Errors from calling the identity-provider relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The request could not be sent or the connection failed.
    Transport { endpoint: String, reason: String },
    /// The relay did not answer within the configured timeout.
    Timeout { endpoint: String },
    /// The relay answered with a status the call does not accept.
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The relay answered with a body that could not be interpreted.
    Malformed { endpoint: String, reason: String },
}

impl RelayError {
    /// Returns the HTTP status the relay answered with, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the relay was never reached or never answered.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    pub(crate) fn from_reqwest(endpoint: &str, e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            Self::Transport {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { endpoint, reason } => {
                write!(f, "relay request to '{endpoint}' failed: {reason}")
            }
            Self::Timeout { endpoint } => {
                write!(f, "relay request to '{endpoint}' timed out")
            }
            Self::UnexpectedStatus {
                endpoint,
                status,
                body,
            } => {
                write!(f, "relay '{endpoint}' answered HTTP {status}: {body}")
            }
            Self::Malformed { endpoint, reason } => {
                write!(f, "relay '{endpoint}' sent a malformed response: {reason}")
            }
        }
    }
}

impl std::error::Error for RelayError {}
