use thiserror::Error;

use scorebox_coord::CoordError;

/// Errors that terminate the worker process.
///
/// Per-check failures never surface here — they become `Timeout` outcomes.
/// Only a broken coordination channel is unrecoverable for a worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("coordination store error: {0}")]
    Coord(#[from] CoordError),

    #[error("no teams assigned to this worker")]
    NoTeams,
}
