use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// A scheduled downtime window during which no checks are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledBreak {
    pub starts_at: DateTime<Utc>,
    /// Whole-second duration of the break.
    pub duration_secs: u64,
}

impl ScheduledBreak {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.starts_at + chrono::Duration::seconds(self.duration_secs as i64)
    }

    /// How much of this break is left as of `now`. `None` once it has ended.
    ///
    /// Observed before the break starts, the remainder is the full duration —
    /// the break loop only asks this once the start has passed or is imminent.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let left = self.ends_at() - now.max(self.starts_at);
        left.to_std().ok().filter(|d| !d.is_zero())
    }
}

/// Overall competition bounds plus the ordered break list. Loaded once at
/// startup; validation happens here so the break loop never re-checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventWindow {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub breaks: Vec<ScheduledBreak>,
}

impl EventWindow {
    /// Reject malformed windows before the scheduler starts: reversed bounds,
    /// breaks out of order, overlapping, or falling outside the event.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.starts_at >= self.ends_at {
            return Err(ConfigError::InvalidWindow(format!(
                "event start {} is not before end {}",
                self.starts_at, self.ends_at
            )));
        }

        let mut prev_end: Option<DateTime<Utc>> = None;
        for b in &self.breaks {
            if b.duration_secs == 0 {
                return Err(ConfigError::InvalidBreaks(format!(
                    "break at {} has zero duration",
                    b.starts_at
                )));
            }
            if b.starts_at < self.starts_at || b.ends_at() > self.ends_at {
                return Err(ConfigError::InvalidBreaks(format!(
                    "break {}..{} falls outside the event window",
                    b.starts_at,
                    b.ends_at()
                )));
            }
            if let Some(end) = prev_end {
                if b.starts_at < end {
                    return Err(ConfigError::InvalidBreaks(format!(
                        "break at {} overlaps or precedes the previous break",
                        b.starts_at
                    )));
                }
            }
            prev_end = Some(b.ends_at());
        }
        Ok(())
    }

    /// The first break that is still upcoming or currently in progress.
    /// `None` means no more pausing for the rest of the event.
    pub fn next_break(&self, now: DateTime<Utc>) -> Option<&ScheduledBreak> {
        self.breaks.iter().find(|b| b.ends_at() > now)
    }

    pub fn started(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now
    }

    pub fn ended(&self, now: DateTime<Utc>) -> bool {
        self.ends_at <= now
    }
}
