use serde::{Deserialize, Serialize};

/// Classification of a single probe's termination.
///
/// Probe scripts express partial credit through their exit code, so the
/// mapping is richer than a success/failure boolean: 0 is full credit, 1 is
/// partial, anything else is a failure. `Timeout` is never derived from an
/// exit code — only the check runner produces it, for probes that had to be
/// killed or never started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Partial,
    Fail,
    Timeout,
}

impl Outcome {
    /// Map a probe's exit code to its scored outcome. Pure and total.
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => Outcome::Pass,
            1 => Outcome::Partial,
            _ => Outcome::Fail,
        }
    }

    /// Stable wire/display name for this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pass => "pass",
            Outcome::Partial => "partial",
            Outcome::Fail => "fail",
            Outcome::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(Outcome::Pass),
            "partial" => Ok(Outcome::Partial),
            "fail" => Ok(Outcome::Fail),
            "timeout" => Ok(Outcome::Timeout),
            other => Err(format!("unknown outcome '{other}'")),
        }
    }
}
