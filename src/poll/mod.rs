//! Polling for the article tracker.
//!
//! [`PollCycle`] performs one fetch, reconcile and notify pass.
//! [`Scheduler`] runs cycles on a fixed interval, escalates repeated
//! failures to an alert and stops when its cancellation token fires.

pub mod cycle;
pub mod scheduler;

pub use cycle::{CyclePhase, CycleSettings, PollCycle};
pub use scheduler::{FailureTracker, Scheduler, SchedulerState, SchedulerSummary};
