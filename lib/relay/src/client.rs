//! The relay client seam.

use async_trait::async_trait;
use stellvia_core::LoginToken;

use crate::error::RelayError;
use crate::types::{CheckState, LoginRequestResponse, Provider, TokenGrant};

/// Calls into the identity-provider relay.
///
/// Implementations must bound every call with a timeout; a call that runs
/// out of time fails with `RelayError::Timeout`.
#[async_trait]
pub trait AuthRelayClient: Send + Sync {
    /// Starts a provider login correlated by `login_token`.
    async fn login_request(
        &self,
        provider: &Provider,
        login_token: &LoginToken,
    ) -> Result<LoginRequestResponse, RelayError>;

    /// Asks whether the login for `login_token` has completed.
    async fn check_state(&self, login_token: &LoginToken) -> Result<CheckState, RelayError>;

    /// Exchanges a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RelayError>;

    /// Revokes the refresh token on the relay (global logout).
    async fn logout(&self, refresh_token: &str) -> Result<(), RelayError>;
}
