use thiserror::Error;

use scorebox_coord::CoordError;
use scorebox_store::StoreError;

/// Errors that abort the master process.
///
/// Per-tick problems (a team's receiver timing out, a persistence failure
/// after retries) are absorbed inside the tick loop; only conditions that
/// make the next tick unsafe surface here.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("coordination store error: {0}")]
    Coord(#[from] CoordError),

    #[error("roster source unavailable: {0}")]
    Roster(#[from] StoreError),
}
