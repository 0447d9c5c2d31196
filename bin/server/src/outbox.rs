//! In-process delivery of sweep notices to web users.
//!
//! The web front has no push channel, so notices wait here until the user
//! next opens the start page. Each session keeps at most
//! [`MAX_NOTICES_PER_SESSION`] notices and older ones are dropped first.
//! At most [`MAX_TRACKED_SESSIONS`] sessions hold queues; beyond that the
//! queue touched least recently is evicted.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use stellvia_core::SessionKey;
use stellvia_scheduler::{Notice, NotifyError, Notifier};
use tokio::sync::Mutex;
use tracing::debug;

/// Notices kept per session before the oldest is dropped.
pub const MAX_NOTICES_PER_SESSION: usize = 50;

/// Sessions with waiting notices before the stalest queue is evicted.
pub const MAX_TRACKED_SESSIONS: usize = 10_000;

#[derive(Debug, Default)]
struct Queue {
    notices: VecDeque<Notice>,
    touched: u64,
}

#[derive(Debug, Default)]
struct Queues {
    by_session: HashMap<SessionKey, Queue>,
    clock: u64,
}

impl Queues {
    fn evict_stalest(&mut self) {
        let stalest = self
            .by_session
            .iter()
            .min_by_key(|(_, queue)| queue.touched)
            .map(|(key, _)| key.clone());
        if let Some(key) = stalest {
            self.by_session.remove(&key);
            debug!(session = %key, "outbox full, evicted stalest session");
        }
    }
}

/// Per-session notice queues.
#[derive(Debug)]
pub struct Outbox {
    queues: Mutex<Queues>,
    max_sessions: usize,
}

impl Default for Outbox {
    fn default() -> Self {
        Self::with_capacity(MAX_TRACKED_SESSIONS)
    }
}

impl Outbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an outbox that tracks at most `max_sessions` sessions.
    #[must_use]
    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            queues: Mutex::new(Queues::default()),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Removes and returns every notice waiting for a session, oldest first.
    pub async fn take(&self, key: &SessionKey) -> Vec<Notice> {
        self.queues
            .lock()
            .await
            .by_session
            .remove(key)
            .map(|queue| Vec::from(queue.notices))
            .unwrap_or_default()
    }

    /// Drops whatever is waiting for a session that has ended.
    pub async fn discard(&self, key: &SessionKey) {
        let dropped = self.take(key).await.len();
        if dropped > 0 {
            debug!(session = %key, dropped, "discarded notices of ended session");
        }
    }

    /// Number of sessions with waiting notices.
    pub async fn tracked_sessions(&self) -> usize {
        self.queues.lock().await.by_session.len()
    }
}

#[async_trait]
impl Notifier for Outbox {
    async fn notify(&self, key: &SessionKey, notice: Notice) -> Result<(), NotifyError> {
        let mut queues = self.queues.lock().await;
        if !queues.by_session.contains_key(key) && queues.by_session.len() >= self.max_sessions {
            queues.evict_stalest();
        }
        queues.clock += 1;
        let clock = queues.clock;

        let queue = queues.by_session.entry(key.clone()).or_default();
        queue.touched = clock;
        if queue.notices.len() >= MAX_NOTICES_PER_SESSION {
            queue.notices.pop_front();
            debug!(session = %key, "outbox full, dropped oldest notice");
        }
        queue.notices.push_back(notice);
        Ok(())
    }
}
