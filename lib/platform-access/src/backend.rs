//! The business-logic service seam and its HTTP client.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::BackendConfig;
use crate::error::BackendError;

const COMMAND_PATH: &str = "/command";
const NOTIFICATIONS_PATH: &str = "/notifications";

/// A user action forwarded to the business service.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
}

impl Command {
    /// Creates a command for a method and path (the path may carry a query).
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    /// Creates a free-form command for `POST /command`.
    #[must_use]
    pub fn generic(payload: serde_json::Value) -> Self {
        Self::new(Method::POST, COMMAND_PATH).with_body(payload)
    }

    /// Attaches a JSON body.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the path, including any query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the JSON body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }
}

/// Raw answer to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body, verbatim.
    pub body: String,
}

impl BackendReply {
    /// Creates a reply.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The user-facing part of a command reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommandReply {
    /// Message to show the user, if the service sent one.
    #[serde(default)]
    pub message: Option<String>,
}

impl CommandReply {
    /// Reads the optional `message` field of a JSON reply.
    ///
    /// Bodies that are not JSON objects yield an empty reply.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NotificationItem {
    Text(String),
    Message { message: String },
    Legacy { text: String },
}

impl NotificationItem {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) | Self::Message { message: text } | Self::Legacy { text } => text,
        }
    }
}

/// Parses a notification list: bare strings or `{"message"|"text": ..}`.
fn parse_notifications(body: &[u8]) -> Result<Vec<String>, serde_json::Error> {
    let items: Vec<NotificationItem> = serde_json::from_slice(body)?;
    Ok(items.into_iter().map(NotificationItem::into_text).collect())
}

/// Calls into the business-logic service on behalf of a user.
#[async_trait]
pub trait BusinessService: Send + Sync {
    /// Sends a command with the bearer token and returns the answer as-is.
    ///
    /// Any HTTP status is a reply; only failing to get one is an error.
    async fn send(&self, access_token: &str, command: &Command)
    -> Result<BackendReply, BackendError>;

    /// Fetches the pending notifications for the token's user.
    async fn fetch_notifications(&self, access_token: &str) -> Result<Vec<String>, BackendError>;

    /// Clears the pending notifications for the token's user.
    async fn clear_notifications(&self, access_token: &str) -> Result<(), BackendError>;
}

/// Business-service client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBusinessService {
    http: reqwest::Client,
    config: BackendConfig,
}

impl HttpBusinessService {
    /// Creates a client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| BackendError::Transport {
                endpoint: config.base_url().to_string(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { http, config })
    }

    fn request(&self, method: Method, path: &str, access_token: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.config.url(path))
            .bearer_auth(access_token)
    }
}

#[async_trait]
impl BusinessService for HttpBusinessService {
    #[instrument(skip_all, fields(method = %command.method(), path = %command.path()))]
    async fn send(
        &self,
        access_token: &str,
        command: &Command,
    ) -> Result<BackendReply, BackendError> {
        let mut request = self.request(command.method().clone(), command.path(), access_token);
        if let Some(body) = command.body() {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "business service request failed");
            BackendError::from_reqwest(command.path(), &e)
        })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::from_reqwest(command.path(), &e))?;

        debug!(status, "business service replied");
        Ok(BackendReply { status, body })
    }

    #[instrument(skip_all)]
    async fn fetch_notifications(&self, access_token: &str) -> Result<Vec<String>, BackendError> {
        let response = self
            .request(Method::GET, NOTIFICATIONS_PATH, access_token)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(NOTIFICATIONS_PATH, &e))?;
        if !response.status().is_success() {
            return Err(BackendError::UnexpectedStatus {
                endpoint: NOTIFICATIONS_PATH.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::from_reqwest(NOTIFICATIONS_PATH, &e))?;
        parse_notifications(&bytes).map_err(|e| BackendError::Malformed {
            endpoint: NOTIFICATIONS_PATH.to_string(),
            reason: e.to_string(),
        })
    }

    #[instrument(skip_all)]
    async fn clear_notifications(&self, access_token: &str) -> Result<(), BackendError> {
        let response = self
            .request(Method::DELETE, NOTIFICATIONS_PATH, access_token)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(NOTIFICATIONS_PATH, &e))?;
        if !response.status().is_success() {
            return Err(BackendError::UnexpectedStatus {
                endpoint: NOTIFICATIONS_PATH.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
