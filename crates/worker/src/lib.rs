//! The scorebox worker: a detached agent that executes probes on behalf of
//! the master.
//!
//! Workers never talk to the relational store. They subscribe to the signal
//! channel, materialize their roster from the coordination store on demand,
//! fan the check runner out across their assigned teams, and push result
//! batches back per team.

pub mod agent;
pub mod error;
pub mod resolve;
pub mod runner;

pub use agent::WorkerAgent;
pub use error::WorkerError;
pub use resolve::SubstitutionCache;
pub use runner::{run_check, EXIT_KILLED, EXIT_SPAWN_FAILED};
