//! Error types for the scheduler crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `NotifyError`: a notice could not be delivered to a user
//! - `SchedulerError`: a sweep could not run at all

use std::fmt;
use stellvia_core::SessionKey;

/// Errors from delivering a notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The transport refused or failed the delivery.
    DeliveryFailed { session: SessionKey, reason: String },
    /// The transport is shut down.
    Closed,
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeliveryFailed { session, reason } => {
                write!(f, "failed to notify session {session}: {reason}")
            }
            Self::Closed => write!(f, "notification transport is closed"),
        }
    }
}

impl std::error::Error for NotifyError {}

/// High-level scheduler errors.
///
/// Per-session failures never surface here; they are logged and counted in
/// the sweep report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The session store could not be scanned.
    ScanFailed { sweep: &'static str, details: String },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScanFailed { sweep, details } => {
                write!(f, "{sweep} sweep could not scan sessions: {details}")
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_error_display() {
        let err = NotifyError::DeliveryFailed {
            session: SessionKey::from(42_i64),
            reason: "chat not found".to_string(),
        };
        assert!(err.to_string().contains("42"));
        assert!(err.to_string().contains("chat not found"));
        assert!(NotifyError::Closed.to_string().contains("closed"));
    }

    #[test]
    fn scheduler_error_display() {
        let err = SchedulerError::ScanFailed {
            sweep: "login",
            details: "connection refused".to_string(),
        };
        assert!(err.to_string().starts_with("login sweep"));
    }
}
