//! The two background sweeps.
//!
//! A sweep scans a bounded batch of sessions, picks the ones in the state
//! it cares about and processes them with bounded concurrency. A failure
//! for one session is logged and counted; the rest of the batch carries on
//! and the session is retried on the next tick.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rootcause::prelude::Report;
use std::sync::Arc;
use stellvia_core::{LoginToken, SessionKey};
use stellvia_platform_access::{
    BusinessService, LoginCompletion, SessionStateMachine, TokenManager,
};
use stellvia_relay::AuthRelayClient;
use stellvia_session::{ScanCursor, SessionStore, StoredSession};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::PollingConfig;
use crate::error::SchedulerError;
use crate::notify::{Notice, Notifier};

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions in the state the sweep handles.
    pub examined: usize,
    /// Sessions whose state or inbox changed.
    pub applied: usize,
    /// Sessions that hit an error.
    pub failed: usize,
}

impl SweepReport {
    fn record(&mut self, processed: Processed) {
        match processed {
            Processed::Applied => self.applied += 1,
            Processed::Skipped => {}
            Processed::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Processed {
    Applied,
    Skipped,
    Failed,
}

/// One periodic pass over sessions.
#[async_trait]
pub trait Sweep: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Runs a single pass.
    async fn run_once(&self) -> Result<SweepReport, Report<SchedulerError>>;
}

/// Reads the next page for a sweep and advances its cursor.
///
/// Consecutive passes rotate through the key space, so every session is
/// reached even when the store holds more than one page. On error the
/// cursor stays put and the page is retried on the next tick.
async fn next_page(
    store: &dyn SessionStore,
    sweep: &'static str,
    cursor: &Mutex<ScanCursor>,
    limit: usize,
) -> Result<Vec<StoredSession>, SchedulerError> {
    let mut cursor = cursor.lock().await;
    let page = store
        .scan(&cursor, limit)
        .await
        .map_err(|e| SchedulerError::ScanFailed {
            sweep,
            details: e.to_string(),
        })?;
    if page.next.is_start() {
        debug!(sweep, "completed a pass over all sessions");
    }
    *cursor = page.next;
    Ok(page.sessions)
}

/// Completes logins for `Anonymous` sessions by polling the relay.
pub struct LoginSweep {
    store: Arc<dyn SessionStore>,
    relay: Arc<dyn AuthRelayClient>,
    machine: Arc<SessionStateMachine>,
    notifier: Arc<dyn Notifier>,
    max_sessions: usize,
    concurrency: usize,
    cursor: Mutex<ScanCursor>,
}

impl LoginSweep {
    /// Creates the sweep.
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        relay: Arc<dyn AuthRelayClient>,
        machine: Arc<SessionStateMachine>,
        notifier: Arc<dyn Notifier>,
        config: &PollingConfig,
    ) -> Self {
        Self {
            store,
            relay,
            machine,
            notifier,
            max_sessions: config.max_sessions_per_sweep,
            concurrency: config.concurrency(),
            cursor: Mutex::new(ScanCursor::start()),
        }
    }

    async fn process(&self, key: SessionKey, token: LoginToken) -> Processed {
        let state = match self.relay.check_state(&token).await {
            Ok(state) => state,
            Err(e) => {
                warn!(session = %key, error = %e, "login check failed");
                return Processed::Failed;
            }
        };

        let completion = match self.machine.complete_login(&key, &token, state).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!(session = %key, error = %e, "could not apply login result");
                return Processed::Failed;
            }
        };

        let notice = match completion {
            LoginCompletion::Pending | LoginCompletion::Stale => return Processed::Skipped,
            LoginCompletion::Completed { display_name, role } => {
                Notice::LoginCompleted { display_name, role }
            }
            LoginCompletion::Rejected => Notice::LoginFailed,
        };

        // The transition is already stored; a lost notice is only logged.
        if let Err(e) = self.notifier.notify(&key, notice).await {
            warn!(session = %key, error = %e, "login notice not delivered");
        }
        Processed::Applied
    }
}

#[async_trait]
impl Sweep for LoginSweep {
    fn name(&self) -> &'static str {
        "login"
    }

    async fn run_once(&self) -> Result<SweepReport, Report<SchedulerError>> {
        let sessions =
            next_page(self.store.as_ref(), self.name(), &self.cursor, self.max_sessions).await?;
        let pending: Vec<(SessionKey, LoginToken)> = sessions
            .into_iter()
            .filter_map(|s| s.record.login_token().copied().map(|token| (s.key, token)))
            .collect();

        let mut report = SweepReport {
            examined: pending.len(),
            ..SweepReport::default()
        };
        let results: Vec<Processed> = stream::iter(pending)
            .map(|(key, token)| self.process(key, token))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        for processed in results {
            report.record(processed);
        }

        if report.applied > 0 || report.failed > 0 {
            info!(?report, "login sweep finished");
        } else {
            debug!(?report, "login sweep finished");
        }
        Ok(report)
    }
}

/// Forwards business-service notifications to signed-in users.
///
/// Uses the stored access token as-is: no refresh, no retry. Sessions whose
/// token is already expired are left for the next user action to refresh.
pub struct NotificationSweep {
    store: Arc<dyn SessionStore>,
    tokens: Arc<TokenManager>,
    backend: Arc<dyn BusinessService>,
    notifier: Arc<dyn Notifier>,
    max_sessions: usize,
    concurrency: usize,
    cursor: Mutex<ScanCursor>,
}

impl NotificationSweep {
    /// Creates the sweep.
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        tokens: Arc<TokenManager>,
        backend: Arc<dyn BusinessService>,
        notifier: Arc<dyn Notifier>,
        config: &PollingConfig,
    ) -> Self {
        Self {
            store,
            tokens,
            backend,
            notifier,
            max_sessions: config.max_sessions_per_sweep,
            concurrency: config.concurrency(),
            cursor: Mutex::new(ScanCursor::start()),
        }
    }

    async fn process(&self, key: SessionKey, access_token: String) -> Processed {
        if self.tokens.is_expired(&access_token) {
            debug!(session = %key, "skipping session with expired token");
            return Processed::Skipped;
        }

        let messages = match self.backend.fetch_notifications(&access_token).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(session = %key, error = %e, "failed to fetch notifications");
                return Processed::Failed;
            }
        };
        if messages.is_empty() {
            return Processed::Skipped;
        }

        let mut delivered_all = true;
        for text in messages {
            if let Err(e) = self.notifier.notify(&key, Notice::Message { text }).await {
                warn!(session = %key, error = %e, "notification not delivered");
                delivered_all = false;
            }
        }
        // Keep the inbox so undelivered messages are fetched again.
        if !delivered_all {
            return Processed::Failed;
        }

        match self.backend.clear_notifications(&access_token).await {
            Ok(()) => Processed::Applied,
            Err(e) => {
                warn!(session = %key, error = %e, "failed to clear notifications");
                Processed::Failed
            }
        }
    }
}

#[async_trait]
impl Sweep for NotificationSweep {
    fn name(&self) -> &'static str {
        "notification"
    }

    async fn run_once(&self) -> Result<SweepReport, Report<SchedulerError>> {
        let sessions =
            next_page(self.store.as_ref(), self.name(), &self.cursor, self.max_sessions).await?;
        let signed_in: Vec<(SessionKey, String)> = sessions
            .into_iter()
            .filter_map(|s| {
                s.record
                    .credentials()
                    .map(|creds| creds.access_token().to_string())
                    .map(|token| (s.key, token))
            })
            .collect();

        let mut report = SweepReport {
            examined: signed_in.len(),
            ..SweepReport::default()
        };
        let results: Vec<Processed> = stream::iter(signed_in)
            .map(|(key, token)| self.process(key, token))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        for processed in results {
            report.record(processed);
        }

        debug!(?report, "notification sweep finished");
        Ok(report)
    }
}
