//! Access-token inspection and the refresh protocol.
//!
//! Tokens are opaque to this crate except for a best-effort look at the JWT
//! payload. Nothing here verifies signatures: the business service does
//! that. Claims only decide when to refresh early and supply profile
//! fallbacks, so any decoding problem is treated as "not expired" and
//! "no claims".
//!
//! A failed refresh always ends the session. The caller is told to
//! re-authenticate and the record is gone from the store.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use stellvia_core::SessionKey;
use stellvia_relay::AuthRelayClient;
use stellvia_session::{Credentials, SessionStore, StoreError};
use tracing::{info, warn};

/// Default tolerance applied to `exp`, in seconds.
pub const DEFAULT_SKEW_SECONDS: i64 = 300;

/// Claims read from an access token payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Expiry as a Unix timestamp.
    #[serde(default)]
    pub exp: Option<i64>,
    /// Email address of the subject.
    #[serde(default)]
    pub email: Option<String>,
    /// Username of the subject.
    #[serde(default)]
    pub username: Option<String>,
    /// Single role claim.
    #[serde(default)]
    pub role: Option<String>,
    /// Role list claim.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl TokenClaims {
    /// Decodes the payload of a JWT without verifying it.
    ///
    /// Returns `None` for anything that is not a three-part token with a
    /// base64url JSON object payload.
    #[must_use]
    pub fn decode(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }

        // Some issuers pad the payload; the no-pad engine rejects that.
        let decoded = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('=').as_bytes())
            .ok()?;
        serde_json::from_slice(&decoded).ok()
    }

    /// Returns a display name from the claims, preferring email.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or(self.username.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// Returns the role, preferring the single-role claim.
    #[must_use]
    pub fn primary_role(&self) -> Option<&str> {
        self.role
            .as_deref()
            .or_else(|| self.roles.first().map(String::as_str))
            .filter(|role| !role.is_empty())
    }
}

/// Result of a refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The pair was rotated and stored.
    Refreshed(Credentials),
    /// The session is gone; the user must sign in again.
    ReauthRequired,
}

/// Expiry checks and refresh for stored sessions.
pub struct TokenManager {
    store: Arc<dyn SessionStore>,
    relay: Arc<dyn AuthRelayClient>,
    skew_seconds: i64,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("skew_seconds", &self.skew_seconds)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Creates a token manager with the default skew.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, relay: Arc<dyn AuthRelayClient>) -> Self {
        Self {
            store,
            relay,
            skew_seconds: DEFAULT_SKEW_SECONDS,
        }
    }

    /// Sets the tolerance applied to `exp`.
    #[must_use]
    pub fn with_skew_seconds(mut self, skew_seconds: i64) -> Self {
        self.skew_seconds = skew_seconds;
        self
    }

    /// Returns true if the token's `exp` claim has passed.
    #[must_use]
    pub fn is_expired(&self, access_token: &str) -> bool {
        self.is_expired_at(access_token, Utc::now())
    }

    /// Returns true if the token counts as expired at `now`.
    ///
    /// Expired means `exp + skew < now`. Tokens without a readable `exp`
    /// are never expired.
    #[must_use]
    pub fn is_expired_at(&self, access_token: &str, now: DateTime<Utc>) -> bool {
        TokenClaims::decode(access_token)
            .and_then(|claims| claims.exp)
            .is_some_and(|exp| exp.saturating_add(self.skew_seconds) < now.timestamp())
    }

    /// Rotates the token pair of a signed-in session.
    ///
    /// Re-reads the stored record so a pair rotated by a concurrent writer
    /// is the one exchanged. On success the new pair (and the new role, if
    /// the relay sent one) replaces the old one in a single write; display
    /// name and pending flow are kept. On any relay failure the session is
    /// deleted.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store fails.
    pub async fn refresh(&self, key: &SessionKey) -> Result<RefreshOutcome, StoreError> {
        let record = match self.store.get(key).await {
            Ok(record) => record,
            Err(e) if e.is_corrupt_record() => {
                warn!(session = %key, error = %e, "dropping unreadable session record");
                self.force_logout(key).await?;
                return Ok(RefreshOutcome::ReauthRequired);
            }
            Err(e) => return Err(e),
        };
        let Some(record) = record else {
            return Ok(RefreshOutcome::ReauthRequired);
        };
        let Some(credentials) = record.credentials() else {
            return Ok(RefreshOutcome::ReauthRequired);
        };

        let grant = match self.relay.refresh(credentials.refresh_token()).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(session = %key, error = %e, "token refresh failed, signing out");
                self.force_logout(key).await?;
                return Ok(RefreshOutcome::ReauthRequired);
            }
        };

        let rotated = match credentials.rotated(
            grant.access_token(),
            grant.refresh_token(),
            grant.role().map(str::to_string),
        ) {
            Ok(rotated) => rotated,
            Err(e) => {
                warn!(session = %key, error = %e, "relay issued unusable tokens, signing out");
                self.force_logout(key).await?;
                return Ok(RefreshOutcome::ReauthRequired);
            }
        };

        self.store
            .put(key, &record.with_credentials(rotated.clone()))
            .await?;
        info!(session = %key, "session tokens refreshed");
        Ok(RefreshOutcome::Refreshed(rotated))
    }

    /// Deletes the session record (local logout).
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn force_logout(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.store.delete(key).await?;
        info!(session = %key, "session signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRelay, authorized, jwt};
    use chrono::TimeZone;
    use serde_json::json;
    use stellvia_relay::{RelayError, TokenGrant};
    use stellvia_session::{InMemorySessionStore, PendingFlow, SessionRecord};

    fn manager(store: &Arc<InMemorySessionStore>, relay: &Arc<FakeRelay>) -> TokenManager {
        TokenManager::new(store.clone(), relay.clone())
    }

    #[test]
    fn decode_reads_claims() {
        let token = jwt(json!({"exp": 1_700_000_000, "email": "a@b.c", "roles": ["Student"]}));
        let claims = TokenClaims::decode(&token).expect("claims");
        assert_eq!(claims.exp, Some(1_700_000_000));
        assert_eq!(claims.display_name(), Some("a@b.c"));
        assert_eq!(claims.primary_role(), Some("Student"));
    }

    #[test]
    fn decode_is_fail_open() {
        assert_eq!(TokenClaims::decode("opaque-token"), None);
        assert_eq!(TokenClaims::decode("a.%%%.c"), None);
        assert_eq!(TokenClaims::decode("a.b.c.d"), None);
        let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode(b"not json"));
        assert_eq!(TokenClaims::decode(&not_json), None);
    }

    #[test]
    fn expiry_applies_skew() {
        let store = Arc::new(InMemorySessionStore::new());
        let relay = Arc::new(FakeRelay::default());
        let tokens = manager(&store, &relay);
        let now = Utc.timestamp_opt(1_000_000, 0).single().expect("time");

        let recent = jwt(json!({"exp": 1_000_000 - 100}));
        assert!(!tokens.is_expired_at(&recent, now));

        let old = jwt(json!({"exp": 1_000_000 - 301}));
        assert!(tokens.is_expired_at(&old, now));

        assert!(!tokens.is_expired_at(&jwt(json!({"sub": "x"})), now));
        assert!(!tokens.is_expired_at("opaque", now));
    }

    #[tokio::test]
    async fn refresh_rotates_tokens_and_keeps_profile() {
        let store = Arc::new(InMemorySessionStore::new());
        let relay = Arc::new(FakeRelay::default());
        let key = SessionKey::from("1");
        let mut record = authorized("a1", "r1");
        record.set_pending_flow(PendingFlow::new("quiz"));
        store.put(&key, &record).await.expect("put");
        relay.push_refresh(Ok(TokenGrant::new("a2", "r2").expect("grant")));

        let outcome = manager(&store, &relay).refresh(&key).await.expect("refresh");

        let RefreshOutcome::Refreshed(creds) = outcome else {
            panic!("expected refreshed");
        };
        assert_eq!(creds.access_token(), "a2");
        let stored = store.get(&key).await.expect("get").expect("record");
        assert_eq!(stored.credentials(), Some(&creds));
        assert_eq!(stored.credentials().and_then(Credentials::role), Some("Teacher"));
        assert!(stored.pending_flow().is_some());
        assert_eq!(relay.calls(), vec!["refresh:r1".to_string()]);
    }

    #[tokio::test]
    async fn refresh_failure_deletes_session() {
        let store = Arc::new(InMemorySessionStore::new());
        let relay = Arc::new(FakeRelay::default());
        let key = SessionKey::from("2");
        store.put(&key, &authorized("a1", "r1")).await.expect("put");
        relay.push_refresh(Err(RelayError::Timeout {
            endpoint: "/refresh".to_string(),
        }));

        let outcome = manager(&store, &relay).refresh(&key).await.expect("refresh");

        assert_eq!(outcome, RefreshOutcome::ReauthRequired);
        assert_eq!(store.get(&key).await.expect("get"), None);
    }

    #[tokio::test]
    async fn refresh_without_signed_in_record_needs_reauth() {
        let store = Arc::new(InMemorySessionStore::new());
        let relay = Arc::new(FakeRelay::default());
        let key = SessionKey::from("3");
        store
            .put(&key, &SessionRecord::anonymous(stellvia_core::LoginToken::new()))
            .await
            .expect("put");

        let outcome = manager(&store, &relay).refresh(&key).await.expect("refresh");

        assert_eq!(outcome, RefreshOutcome::ReauthRequired);
        assert!(relay.calls().is_empty());
        assert!(store.get(&key).await.expect("get").is_some());
    }
}
