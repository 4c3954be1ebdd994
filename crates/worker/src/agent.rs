use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use scorebox_coord::{CoordStore, Signal};
use scorebox_core::{Check, Outcome, ServiceCheckResult, Team};

use crate::error::WorkerError;
use crate::resolve::{materialize_checks, SubstitutionCache};
use crate::runner::{run_check, EXIT_KILLED};

/// Slack added to the probe timeout when collecting a team's check results.
/// The runner itself bounds every probe, so this only covers task overhead.
const COLLECT_SLACK: Duration = Duration::from_secs(2);

struct TeamChecks {
    team: Team,
    checks: Vec<Check>,
}

struct Roster {
    timeout: Duration,
    teams: Vec<TeamChecks>,
}

/// Long-lived probe-executing agent for a static set of teams.
///
/// Subscribes for run/reload signals, materializes its roster from the
/// coordination store on demand, fans the check runner out across its
/// assigned teams, and publishes one result batch per team per signal.
pub struct WorkerAgent {
    coord: Arc<dyn CoordStore>,
    scripts_dir: PathBuf,
    assigned: Vec<String>,
    roster: Option<Roster>,
    cache: SubstitutionCache,
}

impl std::fmt::Debug for WorkerAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerAgent")
            .field("scripts_dir", &self.scripts_dir)
            .field("assigned", &self.assigned)
            .finish_non_exhaustive()
    }
}

impl WorkerAgent {
    pub fn new(
        coord: Arc<dyn CoordStore>,
        scripts_dir: PathBuf,
        assigned: Vec<String>,
    ) -> Result<Self, WorkerError> {
        if assigned.is_empty() {
            return Err(WorkerError::NoTeams);
        }
        Ok(Self {
            coord,
            scripts_dir,
            assigned,
            roster: None,
            cache: SubstitutionCache::new(),
        })
    }

    /// Run the signal loop until `shutdown` fires.
    ///
    /// Returns an error only on unrecoverable subscription failure — the one
    /// condition that terminates a worker process.
    pub async fn run(mut self, shutdown: Arc<Notify>) -> Result<(), WorkerError> {
        let mut signals = self.coord.subscribe_signals().await?;
        info!(teams = ?self.assigned, "worker subscribed, waiting for signals");

        loop {
            tokio::select! {
                received = signals.recv() => {
                    let signal = received?;
                    self.handle_signal(signal).await;
                }
                _ = shutdown.notified() => {
                    info!("worker shutting down");
                    return Ok(());
                }
            }
        }
    }

    async fn handle_signal(&mut self, signal: Signal) {
        if signal == Signal::ReloadThenRun || self.roster.is_none() {
            if let Err(e) = self.reload().await {
                warn!(error = %e, "roster reload failed, skipping this run");
                return;
            }
        }
        self.run_assigned_teams().await;
    }

    /// Fetch the current timeout, team records, and service roster, and
    /// rebuild this worker's checks.
    async fn reload(&mut self) -> Result<(), WorkerError> {
        let timeout = self.coord.check_timeout().await?;
        let services = self.coord.services().await?;
        self.cache.clear();

        let mut teams = Vec::with_capacity(self.assigned.len());
        for addr in &self.assigned {
            match self.coord.team(addr).await? {
                Some(team) => {
                    let checks =
                        materialize_checks(&self.scripts_dir, &team, &services, &mut self.cache);
                    teams.push(TeamChecks { team, checks });
                }
                // A worker can be configured ahead of the roster; keep going
                // with the teams that do exist.
                None => warn!(addr = %addr, "no team record for assigned address"),
            }
        }

        info!(
            teams = teams.len(),
            services = services.len(),
            timeout_secs = timeout.as_secs(),
            "roster materialized"
        );
        self.roster = Some(Roster { timeout, teams });
        Ok(())
    }

    /// Run every assigned team's checks concurrently and publish one batch
    /// per team.
    async fn run_assigned_teams(&self) {
        let Some(roster) = &self.roster else {
            return;
        };

        let mut teams = JoinSet::new();
        for tc in &roster.teams {
            if tc.checks.is_empty() {
                continue;
            }
            let coord = self.coord.clone();
            let team = tc.team.clone();
            let checks = tc.checks.clone();
            let timeout = roster.timeout;
            teams.spawn(async move {
                run_team(coord, team, checks, timeout).await;
            });
        }

        // Each team task is internally deadline-bounded, so this join is too.
        while teams.join_next().await.is_some() {}
    }
}

/// Execute all of one team's checks concurrently, collect under a deadline,
/// and push the batch to the team's result queue.
async fn run_team(coord: Arc<dyn CoordStore>, team: Team, checks: Vec<Check>, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout + COLLECT_SLACK;

    let mut tasks = JoinSet::new();
    for check in checks.iter().cloned() {
        tasks.spawn(async move {
            let (outcome, exit_code) = run_check(&check, timeout).await;
            (check.service_id, outcome, exit_code)
        });
    }

    let mut batch: Vec<ServiceCheckResult> = Vec::with_capacity(checks.len());
    let mut reported: HashSet<i32> = HashSet::new();
    let now = Utc::now();

    loop {
        match tokio::time::timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(Ok((service_id, outcome, exit_code)))) => {
                reported.insert(service_id);
                batch.push(ServiceCheckResult {
                    team_id: team.id,
                    service_id,
                    timestamp: now,
                    outcome,
                    exit_code,
                });
            }
            Ok(Some(Err(e))) => {
                error!(team = %team.name, error = %e, "check task panicked");
            }
            Ok(None) => break,
            Err(_) => {
                // The runner bounds every probe, so a check missing the
                // collection deadline means the worker itself is wedged.
                // Log it apart from ordinary probe timeouts and keep the
                // batch complete with synthesized timeouts.
                error!(
                    team = %team.name,
                    missing = checks.len() - reported.len(),
                    "checks failed to report before the collection deadline"
                );
                tasks.abort_all();
                break;
            }
        }
    }

    for check in &checks {
        if !reported.contains(&check.service_id) {
            batch.push(ServiceCheckResult {
                team_id: team.id,
                service_id: check.service_id,
                timestamp: now,
                outcome: Outcome::Timeout,
                exit_code: EXIT_KILLED,
            });
        }
    }

    if let Err(e) = coord.push_results(&team.addr, &batch).await {
        error!(team = %team.name, error = %e, "failed to publish result batch");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scorebox_coord::MemoryCoordStore;
    use scorebox_core::ServiceDef;

    fn team(id: i32, name: &str, addr: &str) -> Team {
        Team {
            id,
            name: name.into(),
            addr: addr.into(),
        }
    }

    fn service(id: i32, script: &str, args: &str) -> ServiceDef {
        ServiceDef {
            id,
            name: format!("svc-{id}"),
            script: script.into(),
            args: args.into(),
            starts_at: Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0).unwrap(),
            enabled: true,
        }
    }

    async fn seed(store: &MemoryCoordStore, services: &[ServiceDef]) {
        store
            .put_teams(&[team(1, "alpha", "11"), team(2, "bravo", "12")])
            .await
            .unwrap();
        store.put_services(services).await.unwrap();
        store
            .set_check_timeout(Duration::from_secs(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn signal_produces_one_batch_per_assigned_team() {
        let store = Arc::new(MemoryCoordStore::new());
        // `true` ignores its arguments and exits 0.
        seed(&store, &[service(10, "true", "{addr}")]).await;

        let agent = WorkerAgent::new(
            store.clone(),
            PathBuf::from("/usr/bin"),
            vec!["11".into(), "12".into()],
        )
        .unwrap();

        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(agent.run(shutdown.clone()));

        // Let the agent subscribe before signalling.
        tokio::time::sleep(Duration::from_millis(100)).await;
        store.publish_signal(Signal::ReloadThenRun).await.unwrap();

        let batch_a = store
            .pop_results("11", Duration::from_secs(10))
            .await
            .unwrap()
            .expect("team 11 batch");
        let batch_b = store
            .pop_results("12", Duration::from_secs(10))
            .await
            .unwrap()
            .expect("team 12 batch");

        assert_eq!(batch_a.len(), 1);
        assert_eq!(batch_a[0].outcome, Outcome::Pass);
        assert_eq!(batch_a[0].team_id, 1);
        assert_eq!(batch_b[0].team_id, 2);

        shutdown.notify_waiters();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn plain_run_reuses_cached_roster() {
        let store = Arc::new(MemoryCoordStore::new());
        seed(&store, &[service(10, "true", "")]).await;

        let agent =
            WorkerAgent::new(store.clone(), PathBuf::from("/usr/bin"), vec!["11".into()]).unwrap();
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(agent.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // First signal is plain Run: the agent has no cached roster yet, so
        // it materializes one; the second reuses it.
        for _ in 0..2 {
            store.publish_signal(Signal::Run).await.unwrap();
            let batch = store
                .pop_results("11", Duration::from_secs(10))
                .await
                .unwrap()
                .expect("batch");
            assert_eq!(batch.len(), 1);
        }

        shutdown.notify_waiters();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failing_and_missing_probes_are_classified() {
        let store = Arc::new(MemoryCoordStore::new());
        seed(
            &store,
            &[
                service(10, "false", ""),
                service(11, "no-such-probe", ""),
            ],
        )
        .await;

        let agent =
            WorkerAgent::new(store.clone(), PathBuf::from("/usr/bin"), vec!["11".into()]).unwrap();
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(agent.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;

        store.publish_signal(Signal::ReloadThenRun).await.unwrap();
        let mut batch = store
            .pop_results("11", Duration::from_secs(10))
            .await
            .unwrap()
            .expect("batch");
        batch.sort_by_key(|r| r.service_id);

        assert_eq!(batch.len(), 2);
        // `false` exits 1 → partial credit by the exit-code contract.
        assert_eq!(batch[0].outcome, Outcome::Partial);
        assert_eq!(batch[1].outcome, Outcome::Timeout);

        shutdown.notify_waiters();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn empty_assignment_is_rejected() {
        let store = Arc::new(MemoryCoordStore::new());
        let err = WorkerAgent::new(store, PathBuf::from("/usr/bin"), vec![]).unwrap_err();
        assert!(matches!(err, WorkerError::NoTeams));
    }
}
