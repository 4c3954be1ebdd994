//! Shared domain model for the scorebox check scheduler.
//!
//! Teams, service definitions, check outcomes, the event window with its
//! scheduled breaks, and the master's configuration file live here so the
//! scheduler, worker, and stores all speak the same types.

pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod outcome;

pub use config::MasterConfig;
pub use error::ConfigError;
pub use event::{EventWindow, ScheduledBreak};
pub use model::{Check, ServiceCheckResult, ServiceDef, Team};
pub use outcome::Outcome;
