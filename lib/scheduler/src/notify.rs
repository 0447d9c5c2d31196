//! Delivery of sweep results to users.

use async_trait::async_trait;
use stellvia_core::SessionKey;

use crate::error::NotifyError;

/// Something a sweep tells a user without being asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The pending login finished; the session is signed in.
    LoginCompleted {
        display_name: Option<String>,
        role: Option<String>,
    },
    /// The pending login was denied or failed.
    LoginFailed,
    /// A message from the business service.
    Message { text: String },
}

/// The presentation layer, as seen by the sweeps.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one notice to a session's user.
    async fn notify(&self, key: &SessionKey, notice: Notice) -> Result<(), NotifyError>;
}
