//! Key and channel names for the coordination store.
//!
//! Keys follow the pattern `scorebox:<what>` so one Redis instance can be
//! shared with other exercise infrastructure without collisions.

/// Broadcast channel carrying [`crate::Signal`] codes from master to workers.
pub const SIGNAL_CHANNEL: &str = "scorebox:signal";

/// Current probe timeout in whole seconds, refreshed before every dispatch.
pub const TIMEOUT_KEY: &str = "scorebox:timeout";

/// The active service roster as one JSON blob.
pub const SERVICES_KEY: &str = "scorebox:services";

/// Hash of team records, one JSON entry per identifying address.
pub const TEAMS_KEY: &str = "scorebox:teams";

/// Prefix for per-team result queues.
pub const RESULTS_PREFIX: &str = "scorebox:results:";

/// Result queue key for one team's identifying address.
pub fn results_key(addr: &str) -> String {
    format!("{RESULTS_PREFIX}{addr}")
}

/// Round a blocking-pop wait up to whole seconds, never below one.
///
/// The backend expresses pop timeouts in whole time units; rounding down
/// would let a fractional deadline expire before the worker's own bound.
pub fn wait_secs(wait: std::time::Duration) -> u64 {
    let secs = wait.as_secs_f64().ceil() as u64;
    secs.max(1)
}
