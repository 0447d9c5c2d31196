//! Inbound events and user-visible outcomes.
//!
//! Transports translate their input into an `InboundEvent` and render the
//! returned `UserOutcome`. Raw errors never reach users; every result the
//! state machine produces is one of these outcomes.

use stellvia_relay::Provider;

use crate::backend::Command;

/// How far a logout reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutScope {
    /// Forget the session here only.
    Local,
    /// Also revoke the refresh token at the relay.
    Global,
}

/// Something a user did.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Opened the client or asked for the main menu.
    Start,
    /// Chose a provider to sign in with.
    Login { provider: Provider },
    /// Abandoned the current step.
    Cancel,
    /// Asked to sign out.
    Logout { scope: LogoutScope },
    /// Any other action, forwarded to the business service.
    Command(Command),
}

impl InboundEvent {
    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Login { .. } => "login",
            Self::Cancel => "cancel",
            Self::Logout { .. } => "logout",
            Self::Command(_) => "command",
        }
    }
}

/// What the user should see next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserOutcome {
    /// Not signed in: offer these providers.
    LoginChoices { providers: Vec<Provider> },
    /// Open this provider URL to continue signing in.
    RedirectToProvider { url: String },
    /// Sign-in started but not finished at the provider yet.
    PendingLogin,
    /// Signed in.
    Welcome {
        display_name: Option<String>,
        role: Option<String>,
    },
    /// A login was requested while already signed in.
    AlreadySignedIn,
    /// The session was ended.
    SignedOut,
    /// The provider login was denied or failed.
    LoginFailed,
    /// A dependency was unavailable; nothing changed.
    RetryLater,
    /// The business service refused the action.
    Forbidden,
    /// Credentials could not be renewed; sign in again.
    ReauthRequired,
    /// The business service rejected the action.
    Failed { message: String },
    /// The business service's answer, verbatim.
    CommandResult { body: String },
}

impl UserOutcome {
    /// Returns true if the session no longer exists after this outcome.
    #[must_use]
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            Self::SignedOut | Self::LoginFailed | Self::ReauthRequired
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ending_outcomes() {
        assert!(UserOutcome::SignedOut.ends_session());
        assert!(UserOutcome::ReauthRequired.ends_session());
        assert!(!UserOutcome::Forbidden.ends_session());
        assert!(!UserOutcome::PendingLogin.ends_session());
    }

    #[test]
    fn event_kinds() {
        assert_eq!(InboundEvent::Cancel.kind(), "cancel");
        assert_eq!(
            InboundEvent::Logout {
                scope: LogoutScope::Global
            }
            .kind(),
            "logout"
        );
    }
}
