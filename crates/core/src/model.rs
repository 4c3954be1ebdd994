use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::outcome::Outcome;

/// One competing team's addressable network identity.
///
/// `addr` is the team's identifying octet/address string. It keys the team's
/// record and result queue in the coordination store, so it must be unique
/// across the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i32,
    pub name: String,
    pub addr: String,
}

/// One configured probe definition as loaded from the relational store.
///
/// `args` is a whitespace-split template; each token may contain `{addr}`,
/// `{team}`, or `{id}` placeholders that workers resolve per team.
/// `starts_at` partitions the roster: definitions with a future start live in
/// the unstarted set and are never dispatched until promoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDef {
    pub id: i32,
    pub name: String,
    pub script: String,
    pub args: String,
    pub starts_at: DateTime<Utc>,
    pub enabled: bool,
}

impl ServiceDef {
    /// Whether this definition's start time has passed as of `now`.
    pub fn started(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now
    }
}

/// The resolved pairing of one team and one service definition: a concrete
/// command the check runner can execute. Built fresh on every roster
/// materialization, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub team_id: i32,
    pub service_id: i32,
    pub command: String,
    pub args: Vec<String>,
}

/// One probe outcome for one team/service pair within one tick.
///
/// Every record persisted in a tick carries the same `timestamp` (the tick's
/// stamp), so a cycle's scores group together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCheckResult {
    pub team_id: i32,
    pub service_id: i32,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    pub exit_code: i32,
}
