//! Error types for the session crate.
//!
//! - `RecordError`: a record would violate its invariants
//! - `StoreError`: the backing store failed or held an unreadable value

use std::fmt;

/// Errors from constructing session records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A required credential was empty.
    EmptyToken { field: &'static str },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyToken { field } => write!(f, "{field} must not be empty"),
        }
    }
}

impl std::error::Error for RecordError {}

/// Errors from session store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached.
    Connection { details: String },
    /// The store rejected or failed a command.
    Command { details: String },
    /// A record could not be serialized.
    Encode { details: String },
    /// A stored value could not be decoded into a record.
    Decode { key: String, details: String },
}

impl StoreError {
    /// Returns true if the stored value itself is unreadable.
    ///
    /// Callers treat such a record as absent and remove it.
    #[must_use]
    pub fn is_corrupt_record(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection { details } => {
                write!(f, "session store unreachable: {details}")
            }
            Self::Command { details } => write!(f, "session store command failed: {details}"),
            Self::Encode { details } => write!(f, "failed to encode session record: {details}"),
            Self::Decode { key, details } => {
                write!(f, "failed to decode session record '{key}': {details}")
            }
        }
    }
}

impl std::error::Error for StoreError {}
