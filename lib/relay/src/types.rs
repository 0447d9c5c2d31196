//! Typed relay requests and responses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity provider name as understood by the relay (e.g. "github").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Provider(String);

impl Provider {
    /// Returns the provider name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a provider name is blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyProvider;

impl fmt::Display for EmptyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("provider name must not be empty")
    }
}

impl std::error::Error for EmptyProvider {}

impl FromStr for Provider {
    type Err = EmptyProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.is_empty() {
            return Err(EmptyProvider);
        }
        Ok(Self(name.to_ascii_lowercase()))
    }
}

/// Answer to a login request: where to send the user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequestResponse {
    /// Provider authorization URL the user must open.
    #[serde(rename = "redirectURL", alias = "redirect_url", alias = "url")]
    pub redirect_url: String,
}

/// A token pair issued by the relay, with optional profile metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    access_token: String,
    refresh_token: String,
    role: Option<String>,
    display_name: Option<String>,
}

impl TokenGrant {
    /// Creates a grant from a token pair.
    ///
    /// Returns `None` if either token is empty, so a grant always carries
    /// usable credentials.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Option<Self> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();
        if access_token.is_empty() || refresh_token.is_empty() {
            return None;
        }
        Some(Self {
            access_token,
            refresh_token,
            role: None,
            display_name: None,
        })
    }

    /// Sets the role reported by the relay.
    #[must_use]
    pub fn with_role(mut self, role: Option<String>) -> Self {
        self.role = role.filter(|r| !r.is_empty());
        self
    }

    /// Sets the display name reported by the relay.
    #[must_use]
    pub fn with_display_name(mut self, display_name: Option<String>) -> Self {
        self.display_name = display_name.filter(|n| !n.is_empty());
        self
    }

    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Returns the role, if reported.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Returns the display name, if reported.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

/// Result of asking the relay whether a login has completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckState {
    /// The user has not finished at the provider yet.
    Pending,
    /// The login completed and tokens were issued.
    Success(TokenGrant),
    /// The provider or the relay refused the login.
    Denied,
    /// The login failed for another reason.
    Error,
}

impl CheckState {
    /// Returns true if the login token is consumed by this result.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Success(_) => "success",
            Self::Denied => "denied",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}
