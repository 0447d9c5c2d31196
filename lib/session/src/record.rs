//! The per-identity session record.
//!
//! A record is either waiting for a provider login (`Anonymous`, holding
//! the login token) or signed in (`Authorized`, holding the token pair).
//! The two states share no fields, so a record can never carry a login
//! token next to credentials. `Unknown` is not stored at all: it is the
//! meaning of an absent key.
//!
//! Multi-step input scratch state (`PendingFlow`) rides along on the same
//! record but is independent of the authorization state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stellvia_core::LoginToken;

use crate::error::RecordError;

/// Authorization status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No record in the store.
    Unknown,
    /// A provider login has been started and not yet completed.
    Anonymous,
    /// The session holds a valid token pair.
    Authorized,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Anonymous => "anonymous",
            Self::Authorized => "authorized",
        };
        f.write_str(name)
    }
}

/// A provider login in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingLogin {
    login_token: LoginToken,
}

impl PendingLogin {
    /// Returns the login token the relay will report against.
    #[must_use]
    pub fn login_token(&self) -> &LoginToken {
        &self.login_token
    }
}

/// The token pair and profile metadata of a signed-in session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawCredentials")]
pub struct Credentials {
    access_token: String,
    refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCredentials {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

impl TryFrom<RawCredentials> for Credentials {
    type Error = RecordError;

    fn try_from(raw: RawCredentials) -> Result<Self, Self::Error> {
        Ok(Self::new(raw.access_token, raw.refresh_token)?
            .with_display_name(raw.display_name)
            .with_role(raw.role))
    }
}

impl Credentials {
    /// Creates credentials from a token pair.
    ///
    /// # Errors
    ///
    /// Returns an error if either token is empty.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self, RecordError> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();
        if access_token.is_empty() {
            return Err(RecordError::EmptyToken {
                field: "accessToken",
            });
        }
        if refresh_token.is_empty() {
            return Err(RecordError::EmptyToken {
                field: "refreshToken",
            });
        }
        Ok(Self {
            access_token,
            refresh_token,
            display_name: None,
            role: None,
        })
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: Option<String>) -> Self {
        self.display_name = display_name.filter(|name| !name.is_empty());
        self
    }

    /// Sets the role.
    #[must_use]
    pub fn with_role(mut self, role: Option<String>) -> Self {
        self.role = role.filter(|role| !role.is_empty());
        self
    }

    /// Returns the bearer access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Returns the display name, if the relay reported one.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Returns the role, if the relay reported one.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Returns credentials carrying a rotated token pair.
    ///
    /// The display name is kept. The role is replaced when a new one is
    /// given and kept otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if either new token is empty.
    pub fn rotated(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        role: Option<String>,
    ) -> Result<Self, RecordError> {
        let role = role
            .filter(|role| !role.is_empty())
            .or_else(|| self.role.clone());
        Ok(Self::new(access_token, refresh_token)?
            .with_display_name(self.display_name.clone())
            .with_role(role))
    }
}

/// Authorization part of a record, tagged by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum AuthState {
    /// Waiting for the provider login identified by the token.
    Anonymous(PendingLogin),
    /// Signed in.
    Authorized(Credentials),
}

/// Scratch state for a multi-step command (e.g. "create course").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFlow {
    /// Name of the flow being captured.
    pub name: String,
    /// Values collected so far.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl PendingFlow {
    /// Starts an empty flow.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: BTreeMap::new(),
        }
    }

    /// Adds a captured value.
    #[must_use]
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(field.into(), value.into());
        self
    }
}

/// One session record, stored as a single value per session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(flatten)]
    auth: AuthState,
    #[serde(
        default,
        rename = "pendingFlow",
        skip_serializing_if = "Option::is_none"
    )]
    pending_flow: Option<PendingFlow>,
}

impl SessionRecord {
    /// Creates a record for a login in progress.
    #[must_use]
    pub fn anonymous(login_token: LoginToken) -> Self {
        Self {
            auth: AuthState::Anonymous(PendingLogin { login_token }),
            pending_flow: None,
        }
    }

    /// Creates a record for a signed-in session.
    #[must_use]
    pub fn authorized(credentials: Credentials) -> Self {
        Self {
            auth: AuthState::Authorized(credentials),
            pending_flow: None,
        }
    }

    /// Returns the authorization state.
    #[must_use]
    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    /// Returns the status of this record.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match self.auth {
            AuthState::Anonymous(_) => SessionStatus::Anonymous,
            AuthState::Authorized(_) => SessionStatus::Authorized,
        }
    }

    /// Returns the login token while a login is pending.
    #[must_use]
    pub fn login_token(&self) -> Option<&LoginToken> {
        match &self.auth {
            AuthState::Anonymous(pending) => Some(pending.login_token()),
            AuthState::Authorized(_) => None,
        }
    }

    /// Returns the credentials of a signed-in session.
    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        match &self.auth {
            AuthState::Anonymous(_) => None,
            AuthState::Authorized(credentials) => Some(credentials),
        }
    }

    /// Returns the same record with the credentials replaced.
    ///
    /// Pending flow state is carried over.
    #[must_use]
    pub fn with_credentials(&self, credentials: Credentials) -> Self {
        Self {
            auth: AuthState::Authorized(credentials),
            pending_flow: self.pending_flow.clone(),
        }
    }

    /// Returns the pending multi-step flow, if any.
    #[must_use]
    pub fn pending_flow(&self) -> Option<&PendingFlow> {
        self.pending_flow.as_ref()
    }

    /// Sets the pending multi-step flow.
    pub fn set_pending_flow(&mut self, flow: PendingFlow) {
        self.pending_flow = Some(flow);
    }

    /// Removes and returns the pending multi-step flow.
    pub fn take_pending_flow(&mut self) -> Option<PendingFlow> {
        self.pending_flow.take()
    }
}
