//! JSON-over-HTTP relay client.
//!
//! Every call is a `POST` with a JSON body relative to the configured base
//! URL:
//!
//! | Call | Path | Body |
//! |---|---|---|
//! | login request | `/auth-request` | `{"type", "login_token"}` |
//! | completion check | `/check-token` | `{"login_token"}` |
//! | refresh | `/refresh` | `{"refreshToken"}` |
//! | logout | `/logout` | `{"refreshToken"}` |

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stellvia_core::LoginToken;
use tracing::{debug, info, instrument, warn};

use crate::client::AuthRelayClient;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::types::{CheckState, LoginRequestResponse, Provider, TokenGrant};

const AUTH_REQUEST_PATH: &str = "/auth-request";
const CHECK_TOKEN_PATH: &str = "/check-token";
const REFRESH_PATH: &str = "/refresh";
const LOGOUT_PATH: &str = "/logout";

/// Characters of an error body kept for logs and errors.
const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Serialize)]
struct AuthRequestBody<'a> {
    #[serde(rename = "type")]
    provider: &'a str,
    login_token: &'a LoginToken,
}

#[derive(Serialize)]
struct CheckTokenBody<'a> {
    login_token: &'a LoginToken,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenBody<'a> {
    refresh_token: &'a str,
}

/// Body of a `200` answer from `/check-token`.
#[derive(Debug, Default, Deserialize)]
struct CheckTokenReply {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, rename = "accessToken", alias = "access_token")]
    access_token: Option<String>,
    #[serde(default, rename = "refreshToken", alias = "refresh_token")]
    refresh_token: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl CheckTokenReply {
    /// Interprets the reply. A `status` field wins over the HTTP status, and
    /// a success without a full token pair is an error.
    fn into_state(self) -> Result<CheckState, String> {
        let status = self
            .status
            .as_deref()
            .map(|s| s.trim().to_ascii_lowercase());

        match status.as_deref() {
            Some("pending") => Ok(CheckState::Pending),
            Some("denied") => Ok(CheckState::Denied),
            Some("error") => Ok(CheckState::Error),
            Some("success") | None => Ok(self
                .into_grant()
                .map_or(CheckState::Error, CheckState::Success)),
            Some(other) => Err(format!("unknown login status '{other}'")),
        }
    }

    fn into_grant(self) -> Option<TokenGrant> {
        let display_name = self.email.or(self.name).or(self.username);
        TokenGrant::new(self.access_token?, self.refresh_token?)
            .map(|grant| grant.with_role(self.role).with_display_name(display_name))
    }
}

/// Body of a successful `/refresh` answer.
#[derive(Debug, Deserialize)]
struct RefreshReply {
    #[serde(default, rename = "accessToken", alias = "access_token")]
    access_token: Option<String>,
    #[serde(default, rename = "refreshToken", alias = "refresh_token")]
    refresh_token: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

/// Relay client speaking the relay's JSON API.
#[derive(Debug, Clone)]
pub struct HttpRelayClient {
    http: reqwest::Client,
    config: RelayConfig,
}

impl HttpRelayClient {
    /// Creates a client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RelayError::Transport {
                endpoint: config.base_url().to_string(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { http, config })
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, RelayError> {
        let url = self.config.endpoint(path);
        self.http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, endpoint = %url, "relay request failed");
                RelayError::from_reqwest(path, &e)
            })
    }

    async fn read_json<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, RelayError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::from_reqwest(path, &e))?;
        serde_json::from_slice(&bytes).map_err(|e| RelayError::Malformed {
            endpoint: path.to_string(),
            reason: e.to_string(),
        })
    }

    async fn unexpected_status(path: &str, response: reqwest::Response) -> RelayError {
        let status = response.status().as_u16();
        let body = excerpt(&response.text().await.unwrap_or_default());
        warn!(endpoint = %path, status, "relay returned error status");
        debug!(endpoint = %path, body = %body, "relay error body");
        RelayError::UnexpectedStatus {
            endpoint: path.to_string(),
            status,
            body,
        }
    }
}

/// Cuts an error body down to [`BODY_EXCERPT_CHARS`] characters.
///
/// Error pages may echo request bodies, which carry tokens.
fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}

#[async_trait]
impl AuthRelayClient for HttpRelayClient {
    #[instrument(skip_all, fields(provider = %provider))]
    async fn login_request(
        &self,
        provider: &Provider,
        login_token: &LoginToken,
    ) -> Result<LoginRequestResponse, RelayError> {
        let body = AuthRequestBody {
            provider: provider.as_str(),
            login_token,
        };
        let response = self.post(AUTH_REQUEST_PATH, &body).await?;
        if !response.status().is_success() {
            return Err(Self::unexpected_status(AUTH_REQUEST_PATH, response).await);
        }

        let reply: LoginRequestResponse = Self::read_json(AUTH_REQUEST_PATH, response).await?;
        if reply.redirect_url.trim().is_empty() {
            return Err(RelayError::Malformed {
                endpoint: AUTH_REQUEST_PATH.to_string(),
                reason: "empty redirect URL".to_string(),
            });
        }

        debug!("relay issued provider redirect");
        Ok(reply)
    }

    #[instrument(skip_all)]
    async fn check_state(&self, login_token: &LoginToken) -> Result<CheckState, RelayError> {
        let response = self
            .post(CHECK_TOKEN_PATH, &CheckTokenBody { login_token })
            .await?;

        let status = response.status();
        let state = match status {
            StatusCode::ACCEPTED => CheckState::Pending,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CheckState::Denied,
            s if s.is_success() => {
                let reply: CheckTokenReply = Self::read_json(CHECK_TOKEN_PATH, response).await?;
                reply.into_state().map_err(|reason| RelayError::Malformed {
                    endpoint: CHECK_TOKEN_PATH.to_string(),
                    reason,
                })?
            }
            s => {
                warn!(status = %s, "relay reported login error");
                CheckState::Error
            }
        };

        debug!(state = %state, "checked login state");
        Ok(state)
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RelayError> {
        let response = self
            .post(REFRESH_PATH, &RefreshTokenBody { refresh_token })
            .await?;
        if !response.status().is_success() {
            return Err(Self::unexpected_status(REFRESH_PATH, response).await);
        }

        let reply: RefreshReply = Self::read_json(REFRESH_PATH, response).await?;
        let grant = reply
            .access_token
            .zip(reply.refresh_token)
            .and_then(|(access, refresh)| TokenGrant::new(access, refresh))
            .ok_or_else(|| RelayError::Malformed {
                endpoint: REFRESH_PATH.to_string(),
                reason: "refresh answer is missing a token".to_string(),
            })?
            .with_role(reply.role);

        info!("refreshed token pair");
        Ok(grant)
    }

    #[instrument(skip_all)]
    async fn logout(&self, refresh_token: &str) -> Result<(), RelayError> {
        let response = self
            .post(LOGOUT_PATH, &RefreshTokenBody { refresh_token })
            .await?;
        if !response.status().is_success() {
            return Err(Self::unexpected_status(LOGOUT_PATH, response).await);
        }
        info!("revoked refresh token on relay");
        Ok(())
    }
}
