//! Stub collaborators for router and event loop tests.

use async_trait::async_trait;
use std::sync::Arc;
use stellvia_core::{LoginToken, SessionKey};
use stellvia_platform_access::{
    BackendError, BackendReply, BusinessService, Command, SessionStateMachine, TokenManager,
};
use stellvia_relay::{
    AuthRelayClient, CheckState, LoginRequestResponse, Provider, RelayError, TokenGrant,
};
use stellvia_session::{ScanCursor, ScanPage, SessionRecord, SessionStore, StoreError};

pub(crate) const REDIRECT_URL: &str = "https://provider.example/authorize";

/// Relay that redirects every login and never completes one.
pub(crate) struct StubRelay;

#[async_trait]
impl AuthRelayClient for StubRelay {
    async fn login_request(
        &self,
        _provider: &Provider,
        _login_token: &LoginToken,
    ) -> Result<LoginRequestResponse, RelayError> {
        Ok(LoginRequestResponse {
            redirect_url: REDIRECT_URL.to_string(),
        })
    }

    async fn check_state(&self, _login_token: &LoginToken) -> Result<CheckState, RelayError> {
        Ok(CheckState::Pending)
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, RelayError> {
        Err(RelayError::UnexpectedStatus {
            endpoint: "/refresh".to_string(),
            status: 401,
            body: String::new(),
        })
    }

    async fn logout(&self, _refresh_token: &str) -> Result<(), RelayError> {
        Ok(())
    }
}

/// Business service echoing `METHOD path` and the body back.
pub(crate) struct EchoBackend;

#[async_trait]
impl BusinessService for EchoBackend {
    async fn send(
        &self,
        _access_token: &str,
        command: &Command,
    ) -> Result<BackendReply, BackendError> {
        let body = command.body().map(ToString::to_string).unwrap_or_default();
        Ok(BackendReply::new(
            200,
            format!("{} {} {body}", command.method(), command.path()),
        ))
    }

    async fn fetch_notifications(&self, _access_token: &str) -> Result<Vec<String>, BackendError> {
        Ok(Vec::new())
    }

    async fn clear_notifications(&self, _access_token: &str) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Store that is always unreachable.
pub(crate) struct DownStore;

fn unreachable_store() -> StoreError {
    StoreError::Connection {
        details: "connection refused".to_string(),
    }
}

#[async_trait]
impl SessionStore for DownStore {
    async fn get(&self, _key: &SessionKey) -> Result<Option<SessionRecord>, StoreError> {
        Err(unreachable_store())
    }

    async fn put(&self, _key: &SessionKey, _record: &SessionRecord) -> Result<(), StoreError> {
        Err(unreachable_store())
    }

    async fn delete(&self, _key: &SessionKey) -> Result<(), StoreError> {
        Err(unreachable_store())
    }

    async fn scan(&self, _cursor: &ScanCursor, _limit: usize) -> Result<ScanPage, StoreError> {
        Err(unreachable_store())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(unreachable_store())
    }
}

/// Builds a state machine over `store` with the stub relay and echo backend.
pub(crate) fn machine(store: Arc<dyn SessionStore>) -> Arc<SessionStateMachine> {
    let relay: Arc<dyn AuthRelayClient> = Arc::new(StubRelay);
    let tokens = Arc::new(TokenManager::new(store.clone(), relay.clone()));
    let providers = vec!["github".parse().expect("provider"), "code".parse().expect("provider")];
    Arc::new(SessionStateMachine::new(
        store,
        relay,
        tokens,
        Arc::new(EchoBackend),
        providers,
    ))
}
