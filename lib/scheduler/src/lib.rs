//! Background sweeps for the Stellvia access relay.
//!
//! This crate provides:
//!
//! - **Login sweep**: polls the relay for every pending login and applies
//!   the result through the session state machine
//! - **Notification sweep**: forwards business-service notifications to
//!   signed-in users
//! - **Scheduler**: runs each sweep on its own timer until shutdown

pub mod config;
pub mod error;
pub mod notify;
pub mod runner;
pub mod sweep;

pub use config::PollingConfig;
pub use error::{NotifyError, SchedulerError};
pub use notify::{Notice, Notifier};
pub use runner::PollingScheduler;
pub use sweep::{LoginSweep, NotificationSweep, Sweep, SweepReport};
