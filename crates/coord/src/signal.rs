use crate::error::CoordError;

/// Control message broadcast from the master to all workers.
///
/// Encoded on the wire as a bare integer code. The closed enum plus the
/// explicit mapping keeps invalid codes out of the rest of the system: a
/// stray integer fails at decode, not deep inside a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Run the currently cached roster of checks.
    Run,
    /// Re-fetch the roster from the coordination store, then run.
    ReloadThenRun,
}

impl Signal {
    /// Wire code for this signal.
    pub fn code(&self) -> i64 {
        match self {
            Signal::Run => 0,
            Signal::ReloadThenRun => 1,
        }
    }

    /// Decode a wire code. Unknown codes are an error, never a default.
    pub fn from_code(code: i64) -> Result<Self, CoordError> {
        match code {
            0 => Ok(Signal::Run),
            1 => Ok(Signal::ReloadThenRun),
            other => Err(CoordError::UnknownSignal(other)),
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Run => write!(f, "run"),
            Signal::ReloadThenRun => write!(f, "reload-then-run"),
        }
    }
}
