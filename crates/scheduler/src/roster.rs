use chrono::{DateTime, Utc};

use scorebox_core::{ServiceDef, Team};

/// The master's view of the current teams and service definitions.
///
/// Services whose start time has not yet passed live in `unstarted` and are
/// invisible to dispatch; [`Roster::promote`] moves them into `active` once
/// their start passes. The whole struct sits behind the scheduler's mutex —
/// a reload can never clobber a roster mid-tick.
#[derive(Debug, Default)]
pub struct Roster {
    pub teams: Vec<Team>,
    pub active: Vec<ServiceDef>,
    pub unstarted: Vec<ServiceDef>,
}

impl Roster {
    /// Build a roster from freshly loaded teams and services, partitioning
    /// services on their start time as of `now`.
    pub fn partition(teams: Vec<Team>, services: Vec<ServiceDef>, now: DateTime<Utc>) -> Self {
        let (active, unstarted) = services.into_iter().partition(|s| s.started(now));
        Self {
            teams,
            active,
            unstarted,
        }
    }

    /// Move every unstarted service whose start time has passed into the
    /// active set, preserving encounter order. Returns how many promoted.
    pub fn promote(&mut self, now: DateTime<Utc>) -> usize {
        let mut promoted = 0;
        let mut remaining = Vec::with_capacity(self.unstarted.len());
        for service in self.unstarted.drain(..) {
            if service.started(now) {
                self.active.push(service);
                promoted += 1;
            } else {
                remaining.push(service);
            }
        }
        self.unstarted = remaining;
        promoted
    }

    /// Whether a tick has anything to dispatch.
    pub fn dispatchable(&self) -> bool {
        !self.teams.is_empty() && !self.active.is_empty()
    }

    /// Expected number of records in one team's result batch.
    pub fn checks_per_team(&self) -> usize {
        self.active.len()
    }
}
