use std::collections::HashMap;
use std::path::Path;

use scorebox_core::{Check, ServiceDef, Team};

/// Placeholder for a team's identifying address octet.
pub const PLACEHOLDER_ADDR: &str = "{addr}";
/// Placeholder for a team's display name.
pub const PLACEHOLDER_TEAM: &str = "{team}";
/// Placeholder for a team's numeric ID.
pub const PLACEHOLDER_ID: &str = "{id}";

/// Resolves service argument templates per team, memoizing by raw template
/// string.
///
/// Many services share one argument template, so within a single roster
/// materialization each distinct (team, raw string) pair is substituted
/// once. The cache is cleared on reload — resolutions never outlive the
/// roster generation they were built from.
#[derive(Default)]
pub struct SubstitutionCache {
    cache: HashMap<(i32, String), Vec<String>>,
}

impl SubstitutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a raw argument template on whitespace and substitute the team's
    /// address, name, and ID into each token. Deterministic for a given
    /// (team, template) pair.
    pub fn resolve(&mut self, team: &Team, raw: &str) -> Vec<String> {
        if let Some(cached) = self.cache.get(&(team.id, raw.to_string())) {
            return cached.clone();
        }

        let resolved: Vec<String> = raw
            .split_whitespace()
            .map(|token| {
                token
                    .replace(PLACEHOLDER_ADDR, &team.addr)
                    .replace(PLACEHOLDER_TEAM, &team.name)
                    .replace(PLACEHOLDER_ID, &team.id.to_string())
            })
            .collect();

        self.cache
            .insert((team.id, raw.to_string()), resolved.clone());
        resolved
    }

    /// Drop all memoized substitutions (call on roster reload).
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.cache.len()
    }
}

/// Build the concrete checks for one team from the active service roster.
///
/// The command is the service's script resolved under the scripts directory;
/// arguments come from the substitution cache.
pub fn materialize_checks(
    scripts_dir: &Path,
    team: &Team,
    services: &[ServiceDef],
    cache: &mut SubstitutionCache,
) -> Vec<Check> {
    services
        .iter()
        .map(|service| Check {
            team_id: team.id,
            service_id: service.id,
            command: scripts_dir.join(&service.script).to_string_lossy().into_owned(),
            args: cache.resolve(team, &service.args),
        })
        .collect()
}
