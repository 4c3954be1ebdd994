//! The scorebox master: tick-driven check dispatch, break handling, and
//! durable score persistence.
//!
//! One [`Scheduler`] per process owns the roster and its lock, drives one
//! tick per configured interval, and coordinates detached workers purely
//! through the coordination store. Two companion loops feed it: the break
//! loop ([`breaks`]) pauses dispatch through scheduled downtime, and the
//! change listener ([`listener`]) reloads the roster when administrators
//! edit teams or services mid-event.

pub mod breaks;
pub mod error;
pub mod listener;
pub mod roster;
pub mod scheduler;

pub use error::SchedulerError;
pub use roster::Roster;
pub use scheduler::Scheduler;
