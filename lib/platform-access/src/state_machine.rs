//! The per-session authorization state machine.
//!
//! Every transition reads the current record, decides, and writes back a
//! whole record (or deletes it). There are no cross-key transactions, so
//! concurrent writers for one session resolve as last-writer-wins; login
//! results are guarded by the login token they belong to.
//!
//! | State | Event | Result |
//! |---|---|---|
//! | Unknown | `Login` | relay login request, store `Anonymous` |
//! | Unknown | other | login choices |
//! | Anonymous | `Login` | new token replaces the old one |
//! | Anonymous | `Cancel` / `Logout` | delete |
//! | Anonymous | other | inline completion check |
//! | Authorized | `Logout` | delete (global also revokes at the relay) |
//! | Authorized | `Login` | already signed in |
//! | Authorized | `Start` | welcome |
//! | Authorized | `Cancel` | drop pending flow |
//! | Authorized | `Command` | dispatch |

use std::sync::Arc;
use stellvia_core::{LoginToken, SessionKey};
use stellvia_relay::{AuthRelayClient, CheckState, Provider, TokenGrant};
use stellvia_session::{Credentials, PendingFlow, SessionRecord, SessionStore};
use tracing::{debug, info, warn};

use crate::backend::{BusinessService, Command};
use crate::dispatcher::{CommandDispatcher, DispatchOutcome};
use crate::error::AccessError;
use crate::outcome::{InboundEvent, LogoutScope, UserOutcome};
use crate::token::{TokenClaims, TokenManager};

/// Result of applying a relay answer to a pending login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginCompletion {
    /// Still waiting at the provider; nothing changed.
    Pending,
    /// The session is now signed in.
    Completed {
        display_name: Option<String>,
        role: Option<String>,
    },
    /// The login was denied or failed; the session was deleted.
    Rejected,
    /// The session no longer waits for this token; nothing changed.
    Stale,
}

/// Decides transitions for inbound events and login results.
pub struct SessionStateMachine {
    store: Arc<dyn SessionStore>,
    relay: Arc<dyn AuthRelayClient>,
    tokens: Arc<TokenManager>,
    dispatcher: CommandDispatcher,
    providers: Vec<Provider>,
}

impl std::fmt::Debug for SessionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStateMachine")
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}

impl SessionStateMachine {
    /// Creates a state machine offering the given providers.
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        relay: Arc<dyn AuthRelayClient>,
        tokens: Arc<TokenManager>,
        backend: Arc<dyn BusinessService>,
        providers: Vec<Provider>,
    ) -> Self {
        let dispatcher = CommandDispatcher::new(tokens.clone(), backend);
        Self {
            store,
            relay,
            tokens,
            dispatcher,
            providers,
        }
    }

    /// Handles one user event for a session.
    ///
    /// # Errors
    ///
    /// Returns an error only if the session store fails. Relay and business
    /// service failures are reported as outcomes.
    pub async fn handle(
        &self,
        key: &SessionKey,
        event: InboundEvent,
    ) -> stellvia_core::Result<UserOutcome, AccessError> {
        debug!(session = %key, event = event.kind(), "handling event");
        let record = self.load(key).await?;

        let outcome = match record {
            None => self.handle_unknown(key, event).await?,
            Some(record) => match record.login_token().copied() {
                Some(token) => self.handle_anonymous(key, token, event).await?,
                None => self.handle_authorized(key, record, event).await?,
            },
        };
        Ok(outcome)
    }

    async fn handle_unknown(
        &self,
        key: &SessionKey,
        event: InboundEvent,
    ) -> Result<UserOutcome, AccessError> {
        match event {
            InboundEvent::Login { provider } => self.start_login(key, &provider).await,
            _ => Ok(self.login_choices()),
        }
    }

    async fn handle_anonymous(
        &self,
        key: &SessionKey,
        token: LoginToken,
        event: InboundEvent,
    ) -> Result<UserOutcome, AccessError> {
        match event {
            InboundEvent::Login { provider } => self.start_login(key, &provider).await,
            InboundEvent::Cancel | InboundEvent::Logout { .. } => {
                self.tokens.force_logout(key).await?;
                Ok(UserOutcome::SignedOut)
            }
            InboundEvent::Start | InboundEvent::Command(_) => {
                self.check_inline(key, token).await
            }
        }
    }

    async fn handle_authorized(
        &self,
        key: &SessionKey,
        mut record: SessionRecord,
        event: InboundEvent,
    ) -> Result<UserOutcome, AccessError> {
        let Some(credentials) = record.credentials().cloned() else {
            return Ok(self.login_choices());
        };

        match event {
            InboundEvent::Logout { scope } => {
                if scope == LogoutScope::Global {
                    // Best effort: the local session ends either way.
                    if let Err(e) = self.relay.logout(credentials.refresh_token()).await {
                        warn!(session = %key, error = %e, "relay logout failed");
                    }
                }
                self.tokens.force_logout(key).await?;
                Ok(UserOutcome::SignedOut)
            }
            InboundEvent::Login { .. } => Ok(UserOutcome::AlreadySignedIn),
            InboundEvent::Start => Ok(welcome(&credentials)),
            InboundEvent::Cancel => {
                if record.take_pending_flow().is_some() {
                    self.store.put(key, &record).await?;
                    debug!(session = %key, "pending flow cancelled");
                }
                Ok(welcome(&credentials))
            }
            InboundEvent::Command(command) => self.dispatch(key, &credentials, &command).await,
        }
    }

    async fn dispatch(
        &self,
        key: &SessionKey,
        credentials: &Credentials,
        command: &Command,
    ) -> Result<UserOutcome, AccessError> {
        let outcome = match self.dispatcher.dispatch(key, credentials, command).await? {
            DispatchOutcome::Executed { body } => UserOutcome::CommandResult { body },
            DispatchOutcome::Forbidden => UserOutcome::Forbidden,
            DispatchOutcome::ReauthRequired => UserOutcome::ReauthRequired,
            DispatchOutcome::Failed { message, .. } => UserOutcome::Failed { message },
        };
        Ok(outcome)
    }

    /// Requests a provider login under a fresh token.
    ///
    /// The record is written only after the relay accepted the request, so
    /// a failure leaves whatever was stored before.
    async fn start_login(
        &self,
        key: &SessionKey,
        provider: &Provider,
    ) -> Result<UserOutcome, AccessError> {
        let token = LoginToken::new();
        let reply = match self.relay.login_request(provider, &token).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(session = %key, provider = %provider, error = %e, "login request failed");
                return Ok(UserOutcome::RetryLater);
            }
        };

        self.store.put(key, &SessionRecord::anonymous(token)).await?;
        info!(session = %key, provider = %provider, "login started");
        Ok(UserOutcome::RedirectToProvider {
            url: reply.redirect_url,
        })
    }

    async fn check_inline(
        &self,
        key: &SessionKey,
        token: LoginToken,
    ) -> Result<UserOutcome, AccessError> {
        let state = match self.relay.check_state(&token).await {
            Ok(state) => state,
            Err(e) => {
                warn!(session = %key, error = %e, "login check failed");
                return Ok(UserOutcome::RetryLater);
            }
        };

        let outcome = match self.apply_login(key, &token, state).await? {
            LoginCompletion::Pending => UserOutcome::PendingLogin,
            LoginCompletion::Completed { display_name, role } => {
                UserOutcome::Welcome { display_name, role }
            }
            LoginCompletion::Rejected => UserOutcome::LoginFailed,
            LoginCompletion::Stale => self.describe(key).await?,
        };
        Ok(outcome)
    }

    /// Applies a relay answer to the session waiting for `login_token`.
    ///
    /// Nothing is written unless the stored record is still `Anonymous` with
    /// exactly this token, so late answers for replaced tokens and repeated
    /// answers for consumed ones are `Stale`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn complete_login(
        &self,
        key: &SessionKey,
        login_token: &LoginToken,
        state: CheckState,
    ) -> stellvia_core::Result<LoginCompletion, AccessError> {
        Ok(self.apply_login(key, login_token, state).await?)
    }

    async fn apply_login(
        &self,
        key: &SessionKey,
        login_token: &LoginToken,
        state: CheckState,
    ) -> Result<LoginCompletion, AccessError> {
        let current = self.load(key).await?;
        if current.as_ref().and_then(SessionRecord::login_token) != Some(login_token) {
            debug!(session = %key, "login result is stale");
            return Ok(LoginCompletion::Stale);
        }

        match state {
            CheckState::Pending => Ok(LoginCompletion::Pending),
            CheckState::Success(grant) => {
                let Some(credentials) = credentials_from_grant(&grant) else {
                    warn!(session = %key, "relay reported success without usable tokens");
                    self.tokens.force_logout(key).await?;
                    return Ok(LoginCompletion::Rejected);
                };
                let completion = LoginCompletion::Completed {
                    display_name: credentials.display_name().map(str::to_string),
                    role: credentials.role().map(str::to_string),
                };
                self.store
                    .put(key, &SessionRecord::authorized(credentials))
                    .await?;
                info!(session = %key, "login completed");
                Ok(completion)
            }
            CheckState::Denied | CheckState::Error => {
                info!(session = %key, state = %state, "login rejected");
                self.tokens.force_logout(key).await?;
                Ok(LoginCompletion::Rejected)
            }
        }
    }

    /// Describes the current state without side effects.
    async fn describe(&self, key: &SessionKey) -> Result<UserOutcome, AccessError> {
        let outcome = match self.load(key).await? {
            None => self.login_choices(),
            Some(record) => match record.credentials() {
                Some(credentials) => welcome(credentials),
                None => UserOutcome::PendingLogin,
            },
        };
        Ok(outcome)
    }

    /// Starts capturing a multi-step flow for a signed-in session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not signed in or the store fails.
    pub async fn begin_flow(
        &self,
        key: &SessionKey,
        flow: PendingFlow,
    ) -> stellvia_core::Result<(), AccessError> {
        let mut record = self.load_authorized(key).await?;
        record.set_pending_flow(flow);
        self.store.put(key, &record).await.map_err(AccessError::from)?;
        Ok(())
    }

    /// Returns the flow being captured, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn pending_flow(
        &self,
        key: &SessionKey,
    ) -> stellvia_core::Result<Option<PendingFlow>, AccessError> {
        let record = self.load(key).await?;
        Ok(record.and_then(|mut record| record.take_pending_flow()))
    }

    /// Drops the flow being captured and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not signed in or the store fails.
    pub async fn clear_flow(
        &self,
        key: &SessionKey,
    ) -> stellvia_core::Result<Option<PendingFlow>, AccessError> {
        let mut record = self.load_authorized(key).await?;
        let flow = record.take_pending_flow();
        if flow.is_some() {
            self.store.put(key, &record).await.map_err(AccessError::from)?;
        }
        Ok(flow)
    }

    async fn load_authorized(&self, key: &SessionKey) -> Result<SessionRecord, AccessError> {
        match self.load(key).await? {
            Some(record) if record.credentials().is_some() => Ok(record),
            _ => Err(AccessError::NotAuthorized {
                session: key.clone(),
            }),
        }
    }

    /// Reads a record. An unreadable one is deleted and treated as absent.
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionRecord>, AccessError> {
        match self.store.get(key).await {
            Ok(record) => Ok(record),
            Err(e) if e.is_corrupt_record() => {
                warn!(session = %key, error = %e, "dropping unreadable session record");
                self.store.delete(key).await?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn login_choices(&self) -> UserOutcome {
        UserOutcome::LoginChoices {
            providers: self.providers.clone(),
        }
    }
}

fn welcome(credentials: &Credentials) -> UserOutcome {
    UserOutcome::Welcome {
        display_name: credentials.display_name().map(str::to_string),
        role: credentials.role().map(str::to_string),
    }
}

/// Builds stored credentials from a grant, filling profile gaps from the
/// access token's claims.
fn credentials_from_grant(grant: &TokenGrant) -> Option<Credentials> {
    let claims = TokenClaims::decode(grant.access_token()).unwrap_or_default();
    let display_name = grant
        .display_name()
        .or(claims.display_name())
        .map(str::to_string);
    let role = grant.role().or(claims.primary_role()).map(str::to_string);

    Credentials::new(grant.access_token(), grant.refresh_token())
        .ok()
        .map(|credentials| credentials.with_display_name(display_name).with_role(role))
}
