//! Error types for the server.
//!
//! Errors are designed for layered context using rootcause at the library
//! seams; here they mostly decide what a client sees. Details are logged,
//! never returned in a response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

/// Server-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// The configured provider list is empty.
    NoProviders,
    /// The event loop is no longer accepting events.
    EventLoopClosed,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoProviders => write!(f, "no login providers configured"),
            Self::EventLoopClosed => write!(f, "event loop is not running"),
        }
    }
}

impl std::error::Error for ServerError {}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request could not be handled");
        (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_loop_is_unavailable() {
        let response = ServerError::EventLoopClosed.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn display() {
        assert!(ServerError::NoProviders.to_string().contains("providers"));
    }
}
