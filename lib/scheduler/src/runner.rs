//! Timer-driven execution of sweeps.
//!
//! Each sweep gets its own task and `tokio::time::interval`. A tick that
//! arrives while the previous pass is still running is delayed rather than
//! bunched up, so a sweep never overlaps itself.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::config::PollingConfig;
use crate::sweep::{LoginSweep, NotificationSweep, Sweep};

/// Runs sweeps on fixed periods until shut down.
#[derive(Default)]
pub struct PollingScheduler {
    sweeps: Vec<(Arc<dyn Sweep>, Duration)>,
}

impl PollingScheduler {
    /// Creates a scheduler with no sweeps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scheduler running both sweeps at their configured periods.
    #[must_use]
    pub fn from_config(
        config: &PollingConfig,
        login: LoginSweep,
        notifications: NotificationSweep,
    ) -> Self {
        Self::new()
            .with_sweep(Arc::new(login), config.login_interval())
            .with_sweep(Arc::new(notifications), config.notification_interval())
    }

    /// Adds a sweep with its period.
    #[must_use]
    pub fn with_sweep(mut self, sweep: Arc<dyn Sweep>, period: Duration) -> Self {
        self.sweeps.push((sweep, period));
        self
    }

    /// Spawns one task per sweep. Tasks end when `shutdown` turns true or
    /// its sender is dropped.
    #[must_use]
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.sweeps
            .into_iter()
            .map(|(sweep, period)| tokio::spawn(run_periodically(sweep, period, shutdown.clone())))
            .collect()
    }
}

async fn run_periodically(
    sweep: Arc<dyn Sweep>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(sweep = sweep.name(), period_seconds = period.as_secs(), "sweep started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sweep.run_once().await {
                    warn!(sweep = sweep.name(), error = %e, "sweep failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(sweep = sweep.name(), "sweep stopped");
}
