//! Error handling foundation for the Stellvia workspace.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Each crate defines its own domain-specific error kinds in its own
//! error module. Collaborator seams return those kinds directly so callers
//! can branch on them; layers that only propagate wrap them in a `Report`.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
