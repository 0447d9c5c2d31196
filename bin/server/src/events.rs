//! The inbound event loop.
//!
//! Transports hand events to an [`EventSender`]; a single [`EventLoop`] task
//! applies them to the state machine one at a time and answers each on its
//! own reply channel. A store failure is logged, answered with a generic
//! failure and followed by a cooldown before the next event is taken.

use std::sync::Arc;
use std::time::Duration;
use stellvia_core::SessionKey;
use stellvia_platform_access::{InboundEvent, SessionStateMachine, UserOutcome};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use crate::config::EventLoopConfig;
use crate::error::ServerError;

/// Shown when an event could not be handled at all.
pub const GENERIC_FAILURE: &str = "Something went wrong, please try again in a moment";

struct Envelope {
    key: SessionKey,
    event: InboundEvent,
    reply: oneshot::Sender<UserOutcome>,
}

/// Handle for submitting events to the loop.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Envelope>,
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender").finish_non_exhaustive()
    }
}

impl EventSender {
    /// Submits an event and waits for its outcome.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::EventLoopClosed` if the loop has stopped.
    pub async fn send(
        &self,
        key: SessionKey,
        event: InboundEvent,
    ) -> Result<UserOutcome, ServerError> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(Envelope { key, event, reply })
            .await
            .map_err(|_| ServerError::EventLoopClosed)?;
        outcome.await.map_err(|_| ServerError::EventLoopClosed)
    }
}

/// Sequential consumer of inbound events.
pub struct EventLoop {
    machine: Arc<SessionStateMachine>,
    rx: mpsc::Receiver<Envelope>,
    cooldown: Duration,
}

/// Creates a connected sender and loop.
#[must_use]
pub fn channel(
    machine: Arc<SessionStateMachine>,
    config: &EventLoopConfig,
) -> (EventSender, EventLoop) {
    let (tx, rx) = mpsc::channel(config.capacity());
    (
        EventSender { tx },
        EventLoop {
            machine,
            rx,
            cooldown: config.cooldown(),
        },
    )
}

impl EventLoop {
    /// Runs until every sender is dropped.
    pub async fn run(mut self) {
        while let Some(Envelope { key, event, reply }) = self.rx.recv().await {
            let kind = event.kind();
            match self.machine.handle(&key, event).await {
                Ok(outcome) => {
                    // The caller may have gone away; the transition stands.
                    let _ = reply.send(outcome);
                }
                Err(e) => {
                    error!(session = %key, event = kind, error = %e, "event handling failed");
                    let _ = reply.send(UserOutcome::Failed {
                        message: GENERIC_FAILURE.to_string(),
                    });
                    tokio::time::sleep(self.cooldown).await;
                }
            }
        }
        info!("event loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DownStore, REDIRECT_URL, machine};
    use stellvia_session::{InMemorySessionStore, SessionStore};
    use tokio::time::Instant;

    fn config() -> EventLoopConfig {
        EventLoopConfig {
            queue_capacity: 4,
            cooldown_seconds: 5,
        }
    }

    #[tokio::test]
    async fn events_are_applied_in_order() {
        let store = Arc::new(InMemorySessionStore::new());
        let (sender, event_loop) = channel(machine(store.clone()), &config());
        tokio::spawn(event_loop.run());
        let key = SessionKey::from("web-1");

        let outcome = sender.send(key.clone(), InboundEvent::Start).await;
        assert!(matches!(outcome, Ok(UserOutcome::LoginChoices { ref providers }) if providers.len() == 2));

        let login = InboundEvent::Login {
            provider: "github".parse().expect("provider"),
        };
        assert_eq!(
            sender.send(key.clone(), login).await,
            Ok(UserOutcome::RedirectToProvider {
                url: REDIRECT_URL.to_string()
            })
        );
        assert!(store.get(&key).await.expect("get").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn store_failure_answers_generically_then_cools_down() {
        let (sender, event_loop) = channel(machine(Arc::new(DownStore)), &config());
        tokio::spawn(event_loop.run());
        let key = SessionKey::from("web-1");

        assert_eq!(
            sender.send(key.clone(), InboundEvent::Start).await,
            Ok(UserOutcome::Failed {
                message: GENERIC_FAILURE.to_string()
            })
        );

        let started = Instant::now();
        let second = sender.send(key, InboundEvent::Start).await;
        assert!(matches!(second, Ok(UserOutcome::Failed { .. })));
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn stopped_loop_is_reported() {
        let (sender, event_loop) = channel(
            machine(Arc::new(InMemorySessionStore::new())),
            &config(),
        );
        drop(event_loop);

        assert_eq!(
            sender.send(SessionKey::from("web-1"), InboundEvent::Start).await,
            Err(ServerError::EventLoopClosed)
        );
    }
}
