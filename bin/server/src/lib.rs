//! Stellvia access relay server.
//!
//! This crate wires the session state machine to its surfaces:
//! - `events`: the sequential event loop every transport submits to
//! - `web`: the cookie-driven web front
//! - `outbox`: where background sweeps leave notices for web users
//! - `config`: environment-driven configuration

pub mod config;
pub mod error;
pub mod events;
pub mod outbox;
pub mod web;

#[cfg(test)]
mod testing;

pub use config::{EventLoopConfig, ServerConfig, WebConfig};
pub use error::ServerError;
pub use events::{EventLoop, EventSender};
pub use outbox::Outbox;
pub use web::{WebState, router};
