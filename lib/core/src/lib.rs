//! Core identifiers and utilities for the Stellvia access relay.
//!
//! This crate provides the identifier types shared by the session store,
//! the relay client and the session state machine, plus the rootcause
//! based `Result` alias used where errors propagate without branching.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{LoginToken, ParseIdError, SessionKey};
