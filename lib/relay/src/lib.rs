//! Client for the identity-provider relay.
//!
//! The relay runs the provider side of a login and exposes a polling
//! completion check, so clients that cannot receive a provider callback can
//! still authenticate. This crate provides:
//! - `AuthRelayClient`: the four relay calls (login request, completion
//!   check, refresh, logout)
//! - `HttpRelayClient`: the JSON-over-HTTP implementation
//! - Typed responses (`LoginRequestResponse`, `CheckState`, `TokenGrant`)
//!   validated at the boundary
//!
//! # Example
//!
//! ```
//! use stellvia_relay::{CheckState, Provider, TokenGrant};
//!
//! let provider: Provider = "github".parse().unwrap();
//! assert_eq!(provider.as_str(), "github");
//!
//! let state = CheckState::Success(TokenGrant::new("access", "refresh").unwrap());
//! assert!(state.is_terminal());
//! assert!(!CheckState::Pending.is_terminal());
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use client::AuthRelayClient;
pub use config::RelayConfig;
pub use error::RelayError;
pub use http::HttpRelayClient;
pub use types::{CheckState, EmptyProvider, LoginRequestResponse, Provider, TokenGrant};
