//! Scripted fakes for the relay and business service.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::collections::VecDeque;
use std::sync::Mutex;
use stellvia_core::LoginToken;
use stellvia_relay::{
    AuthRelayClient, CheckState, LoginRequestResponse, Provider, RelayError, TokenGrant,
};
use stellvia_session::{Credentials, SessionRecord};

use crate::backend::{BackendReply, BusinessService, Command};
use crate::error::BackendError;

pub(crate) const REDIRECT_URL: &str = "https://provider.example/authorize";

/// Builds an unsigned JWT carrying the given payload.
pub(crate) fn jwt(payload: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{body}.sig")
}

/// A signed-in record for "alice" with the Teacher role.
pub(crate) fn authorized(access: &str, refresh: &str) -> SessionRecord {
    SessionRecord::authorized(
        Credentials::new(access, refresh)
            .expect("valid tokens")
            .with_display_name(Some("alice".to_string()))
            .with_role(Some("Teacher".to_string())),
    )
}

/// Relay fake answering from queues, recording every call.
///
/// Empty queues answer: redirect for login, `Pending` for checks, 401 for
/// refresh, success for logout.
#[derive(Default)]
pub(crate) struct FakeRelay {
    logins: Mutex<VecDeque<Result<LoginRequestResponse, RelayError>>>,
    checks: Mutex<VecDeque<Result<CheckState, RelayError>>>,
    refreshes: Mutex<VecDeque<Result<TokenGrant, RelayError>>>,
    logout_error: Mutex<Option<RelayError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRelay {
    pub(crate) fn push_login(&self, reply: Result<LoginRequestResponse, RelayError>) {
        self.logins.lock().expect("lock").push_back(reply);
    }

    pub(crate) fn push_check(&self, reply: Result<CheckState, RelayError>) {
        self.checks.lock().expect("lock").push_back(reply);
    }

    pub(crate) fn push_refresh(&self, reply: Result<TokenGrant, RelayError>) {
        self.refreshes.lock().expect("lock").push_back(reply);
    }

    pub(crate) fn fail_logout(&self, error: RelayError) {
        *self.logout_error.lock().expect("lock") = Some(error);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("lock").push(call);
    }
}

#[async_trait]
impl AuthRelayClient for FakeRelay {
    async fn login_request(
        &self,
        provider: &Provider,
        _login_token: &LoginToken,
    ) -> Result<LoginRequestResponse, RelayError> {
        self.record(format!("login_request:{provider}"));
        self.logins.lock().expect("lock").pop_front().unwrap_or_else(|| {
            Ok(LoginRequestResponse {
                redirect_url: REDIRECT_URL.to_string(),
            })
        })
    }

    async fn check_state(&self, login_token: &LoginToken) -> Result<CheckState, RelayError> {
        self.record(format!("check_state:{login_token}"));
        self.checks
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(Ok(CheckState::Pending))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RelayError> {
        self.record(format!("refresh:{refresh_token}"));
        self.refreshes.lock().expect("lock").pop_front().unwrap_or_else(|| {
            Err(RelayError::UnexpectedStatus {
                endpoint: "/refresh".to_string(),
                status: 401,
                body: String::new(),
            })
        })
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), RelayError> {
        self.record(format!("logout:{refresh_token}"));
        match self.logout_error.lock().expect("lock").clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Business-service fake answering commands from a queue (default `200 {}`).
#[derive(Default)]
pub(crate) struct FakeBackend {
    replies: Mutex<VecDeque<Result<BackendReply, BackendError>>>,
    tokens_used: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub(crate) fn push_reply(&self, reply: Result<BackendReply, BackendError>) {
        self.replies.lock().expect("lock").push_back(reply);
    }

    pub(crate) fn tokens_used(&self) -> Vec<String> {
        self.tokens_used.lock().expect("lock").clone()
    }
}

#[async_trait]
impl BusinessService for FakeBackend {
    async fn send(
        &self,
        access_token: &str,
        _command: &Command,
    ) -> Result<BackendReply, BackendError> {
        self.tokens_used
            .lock()
            .expect("lock")
            .push(access_token.to_string());
        self.replies
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Ok(BackendReply::new(200, "{}")))
    }

    async fn fetch_notifications(&self, _access_token: &str) -> Result<Vec<String>, BackendError> {
        Ok(Vec::new())
    }

    async fn clear_notifications(&self, _access_token: &str) -> Result<(), BackendError> {
        Ok(())
    }
}
