//! Authorized command dispatch.
//!
//! Each dispatch may refresh credentials at most once. The refresh is spent
//! either proactively, when the stored access token is already past its
//! `exp`, or on the first 401 from the service. A 401 after the refresh has
//! been spent ends the session.

use std::sync::Arc;
use stellvia_core::SessionKey;
use stellvia_session::{Credentials, StoreError};
use tracing::{debug, info, warn};

use crate::backend::{BusinessService, Command, CommandReply};
use crate::token::{RefreshOutcome, TokenManager};

/// Classified result of a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 2xx; the body is returned verbatim.
    Executed { body: String },
    /// 403; nothing changed.
    Forbidden,
    /// Credentials could not be renewed and the session was deleted.
    ReauthRequired,
    /// Any other failure; nothing changed.
    Failed { status: Option<u16>, message: String },
}

/// Sends commands with the session's bearer token.
pub struct CommandDispatcher {
    tokens: Arc<TokenManager>,
    backend: Arc<dyn BusinessService>,
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(tokens: Arc<TokenManager>, backend: Arc<dyn BusinessService>) -> Self {
        Self { tokens, backend }
    }

    /// Sends a command for a signed-in session.
    ///
    /// `credentials` are the ones read with the session record; after a
    /// refresh the rotated pair is used for the retry.
    ///
    /// # Errors
    ///
    /// Returns an error only if the session store fails while refreshing or
    /// signing out.
    pub async fn dispatch(
        &self,
        key: &SessionKey,
        credentials: &Credentials,
        command: &Command,
    ) -> Result<DispatchOutcome, StoreError> {
        let mut refreshed = false;
        let mut access_token = credentials.access_token().to_string();

        if self.tokens.is_expired(&access_token) {
            debug!(session = %key, "access token expired, refreshing before dispatch");
            refreshed = true;
            match self.tokens.refresh(key).await? {
                RefreshOutcome::Refreshed(rotated) => {
                    access_token = rotated.access_token().to_string();
                }
                RefreshOutcome::ReauthRequired => return Ok(DispatchOutcome::ReauthRequired),
            }
        }

        loop {
            let reply = match self.backend.send(&access_token, command).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(session = %key, error = %e, "command could not be delivered");
                    return Ok(DispatchOutcome::Failed {
                        status: None,
                        message: "the service is unavailable, please try again later"
                            .to_string(),
                    });
                }
            };

            match reply.status {
                _ if reply.is_success() => {
                    return Ok(DispatchOutcome::Executed { body: reply.body });
                }
                403 => return Ok(DispatchOutcome::Forbidden),
                401 if !refreshed => {
                    debug!(session = %key, "command unauthorized, refreshing");
                    refreshed = true;
                    match self.tokens.refresh(key).await? {
                        RefreshOutcome::Refreshed(rotated) => {
                            access_token = rotated.access_token().to_string();
                        }
                        RefreshOutcome::ReauthRequired => {
                            return Ok(DispatchOutcome::ReauthRequired);
                        }
                    }
                }
                401 => {
                    info!(session = %key, "fresh token rejected, signing out");
                    self.tokens.force_logout(key).await?;
                    return Ok(DispatchOutcome::ReauthRequired);
                }
                status => {
                    let message = CommandReply::parse(&reply.body)
                        .message
                        .unwrap_or_else(|| format!("request failed with status {status}"));
                    return Ok(DispatchOutcome::Failed {
                        status: Some(status),
                        message,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendReply;
    use crate::error::BackendError;
    use crate::testing::{FakeBackend, FakeRelay, authorized, jwt};
    use serde_json::json;
    use stellvia_relay::{RelayError, TokenGrant};
    use stellvia_session::{InMemorySessionStore, SessionStore};

    struct Harness {
        store: Arc<InMemorySessionStore>,
        relay: Arc<FakeRelay>,
        backend: Arc<FakeBackend>,
        dispatcher: CommandDispatcher,
        key: SessionKey,
    }

    async fn harness(access: &str) -> Harness {
        let store = Arc::new(InMemorySessionStore::new());
        let relay = Arc::new(FakeRelay::default());
        let backend = Arc::new(FakeBackend::default());
        let tokens = Arc::new(TokenManager::new(store.clone(), relay.clone()));
        let dispatcher = CommandDispatcher::new(tokens, backend.clone());
        let key = SessionKey::from("500");
        store.put(&key, &authorized(access, "r1")).await.expect("put");
        Harness {
            store,
            relay,
            backend,
            dispatcher,
            key,
        }
    }

    impl Harness {
        async fn dispatch(&self) -> DispatchOutcome {
            let record = self.store.get(&self.key).await.expect("get").expect("record");
            let creds = record.credentials().expect("credentials").clone();
            self.dispatcher
                .dispatch(&self.key, &creds, &Command::generic(json!({"text": "hi"})))
                .await
                .expect("dispatch")
        }
    }

    #[tokio::test]
    async fn success_returns_body_verbatim() {
        let h = harness("a1").await;
        h.backend.push_reply(Ok(BackendReply::new(200, r#"{"message":"ok"}"#)));

        assert_eq!(
            h.dispatch().await,
            DispatchOutcome::Executed {
                body: r#"{"message":"ok"}"#.to_string()
            }
        );
        assert_eq!(h.backend.tokens_used(), vec!["a1".to_string()]);
    }

    #[tokio::test]
    async fn forbidden_is_not_retried() {
        let h = harness("a1").await;
        h.backend.push_reply(Ok(BackendReply::new(403, "")));

        assert_eq!(h.dispatch().await, DispatchOutcome::Forbidden);
        assert_eq!(h.backend.tokens_used().len(), 1);
        assert!(h.relay.calls().is_empty());
        assert!(h.store.get(&h.key).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn unauthorized_refreshes_once_and_retries() {
        let h = harness("a1").await;
        h.backend.push_reply(Ok(BackendReply::new(401, "")));
        h.backend.push_reply(Ok(BackendReply::new(200, "retried")));
        h.relay
            .push_refresh(Ok(TokenGrant::new("a2", "r2").expect("grant")));

        assert_eq!(
            h.dispatch().await,
            DispatchOutcome::Executed {
                body: "retried".to_string()
            }
        );
        assert_eq!(h.backend.tokens_used(), vec!["a1".to_string(), "a2".to_string()]);
        let stored = h.store.get(&h.key).await.expect("get").expect("record");
        assert_eq!(stored.credentials().map(Credentials::refresh_token), Some("r2"));
    }

    #[tokio::test]
    async fn refresh_failure_requires_reauth() {
        let h = harness("a1").await;
        h.backend.push_reply(Ok(BackendReply::new(401, "")));
        h.relay.push_refresh(Err(RelayError::UnexpectedStatus {
            endpoint: "/refresh".to_string(),
            status: 401,
            body: String::new(),
        }));

        assert_eq!(h.dispatch().await, DispatchOutcome::ReauthRequired);
        assert_eq!(h.store.get(&h.key).await.expect("get"), None);
        assert_eq!(h.backend.tokens_used().len(), 1);
    }

    #[tokio::test]
    async fn second_unauthorized_signs_out_without_second_refresh() {
        let h = harness("a1").await;
        h.backend.push_reply(Ok(BackendReply::new(401, "")));
        h.backend.push_reply(Ok(BackendReply::new(401, "")));
        h.relay
            .push_refresh(Ok(TokenGrant::new("a2", "r2").expect("grant")));

        assert_eq!(h.dispatch().await, DispatchOutcome::ReauthRequired);
        assert_eq!(h.relay.calls(), vec!["refresh:r1".to_string()]);
        assert_eq!(h.store.get(&h.key).await.expect("get"), None);
    }

    #[tokio::test]
    async fn expired_token_spends_the_budget_up_front() {
        let h = harness(&jwt(json!({"exp": 1}))).await;
        h.relay
            .push_refresh(Ok(TokenGrant::new("a2", "r2").expect("grant")));
        h.backend.push_reply(Ok(BackendReply::new(401, "")));

        assert_eq!(h.dispatch().await, DispatchOutcome::ReauthRequired);
        assert_eq!(h.backend.tokens_used(), vec!["a2".to_string()]);
        assert_eq!(h.relay.calls().len(), 1);
    }

    #[tokio::test]
    async fn other_failures_change_nothing() {
        let h = harness("a1").await;
        h.backend
            .push_reply(Ok(BackendReply::new(422, r#"{"message":"title required"}"#)));
        assert_eq!(
            h.dispatch().await,
            DispatchOutcome::Failed {
                status: Some(422),
                message: "title required".to_string()
            }
        );

        h.backend.push_reply(Err(BackendError::Timeout {
            endpoint: "/command".to_string(),
        }));
        assert!(matches!(
            h.dispatch().await,
            DispatchOutcome::Failed { status: None, .. }
        ));
        assert!(h.store.get(&h.key).await.expect("get").is_some());
    }
}
