//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `BackendError`: the business service could not be reached or answered
//!   with something unusable
//! - `AccessError`: a session transition could not be carried out

use std::fmt;
use stellvia_core::SessionKey;
use stellvia_session::StoreError;

/// Errors from calling the business-logic service.
///
/// A non-2xx answer to a user command is not an error here: the dispatcher
/// classifies it. These are failures to obtain an answer at all, or answers
/// to internal calls (notifications) that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The request could not be sent or the connection failed.
    Transport { endpoint: String, reason: String },
    /// The service did not answer within the configured timeout.
    Timeout { endpoint: String },
    /// The service answered with a status the call does not accept.
    UnexpectedStatus { endpoint: String, status: u16 },
    /// The service answered with a body that could not be interpreted.
    Malformed { endpoint: String, reason: String },
}

impl BackendError {
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

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { endpoint, reason } => {
                write!(f, "business service request to '{endpoint}' failed: {reason}")
            }
            Self::Timeout { endpoint } => {
                write!(f, "business service request to '{endpoint}' timed out")
            }
            Self::UnexpectedStatus { endpoint, status } => {
                write!(f, "business service '{endpoint}' answered HTTP {status}")
            }
            Self::Malformed { endpoint, reason } => {
                write!(
                    f,
                    "business service '{endpoint}' sent a malformed response: {reason}"
                )
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// Errors from session transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The session store failed.
    Store(StoreError),
    /// The operation needs a signed-in session.
    NotAuthorized { session: SessionKey },
}

impl From<StoreError> for AccessError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "session store failure: {e}"),
            Self::NotAuthorized { session } => {
                write!(f, "session {session} is not signed in")
            }
        }
    }
}

impl std::error::Error for AccessError {}
