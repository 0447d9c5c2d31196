//! Session lifecycle and authorized access for the Stellvia access relay.
//!
//! This crate provides:
//! - `SessionStateMachine`: decides the next state and the user-visible
//!   outcome for each inbound event, and applies login results
//! - `TokenManager`: access-token expiry checks and the refresh protocol
//! - `CommandDispatcher`: bearer-token attachment with a single
//!   refresh-and-retry on 401
//! - `BusinessService`: the business-logic service seam and its HTTP client
//!
//! # Session Model
//!
//! A session is `Unknown` (no record), `Anonymous` (waiting for a provider
//! login under a one-time login token) or `Authorized` (holding an access
//! and refresh token pair). A failed refresh, a denied login and a logout
//! all delete the record.
//!
//! # Example
//!
//! ```
//! use stellvia_platform_access::{Command, InboundEvent, LogoutScope, TokenClaims};
//!
//! let event = InboundEvent::Command(Command::generic(serde_json::json!({"text": "/courses"})));
//! assert_eq!(event.kind(), "command");
//!
//! let logout = InboundEvent::Logout { scope: LogoutScope::Global };
//! assert_eq!(logout.kind(), "logout");
//!
//! // Opaque tokens carry no claims and never count as expired.
//! assert!(TokenClaims::decode("opaque").is_none());
//! ```

pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod outcome;
pub mod state_machine;
pub mod token;

#[cfg(test)]
mod testing;

pub use backend::{BackendReply, BusinessService, Command, CommandReply, HttpBusinessService};
pub use config::BackendConfig;
pub use dispatcher::{CommandDispatcher, DispatchOutcome};
pub use error::{AccessError, BackendError};
pub use outcome::{InboundEvent, LogoutScope, UserOutcome};
pub use state_machine::{LoginCompletion, SessionStateMachine};
pub use token::{DEFAULT_SKEW_SECONDS, RefreshOutcome, TokenClaims, TokenManager};
