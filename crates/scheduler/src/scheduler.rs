use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use scorebox_coord::{CoordError, CoordStore, Signal};
use scorebox_core::{EventWindow, ServiceCheckResult, Team};
use scorebox_store::{retry::DEFAULT_MAX_ATTEMPTS, with_quadratic_retry, ScoreStore};

use crate::error::SchedulerError;
use crate::roster::Roster;

/// Slack added to the probe timeout when waiting on a team's result queue.
/// Covers the worker's own collection slack plus queue round-trip time.
const COLLECT_SLACK: Duration = Duration::from_secs(5);

/// The scoring master.
///
/// Owns the roster and its lock, the injected store handles, and the
/// shutdown signal. Drives one tick per interval: jitter, promote, publish,
/// collect under a deadline, persist with retry. At most one dispatch is
/// ever outstanding — the roster mutex is held across a tick's entire
/// roster-dependent section, so reloads serialize with dispatch.
pub struct Scheduler {
    coord: Arc<dyn CoordStore>,
    store: Arc<dyn ScoreStore>,
    event: EventWindow,
    interval: Duration,
    check_timeout: Duration,
    roster: Mutex<Roster>,
    reload_pending: AtomicBool,
    shutdown: Arc<Notify>,
}

enum TeamCollection {
    Batch { team: Team, batch: Vec<ServiceCheckResult> },
    TimedOut { team: Team },
    Failed { team: Team, error: CoordError },
}

impl Scheduler {
    pub fn new(
        coord: Arc<dyn CoordStore>,
        store: Arc<dyn ScoreStore>,
        event: EventWindow,
        interval: Duration,
        check_timeout: Duration,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            coord,
            store,
            event,
            interval,
            check_timeout,
            roster: Mutex::new(Roster::default()),
            reload_pending: AtomicBool::new(false),
            shutdown,
        }
    }

    /// Load the full roster from the relational store (with retry), swap it
    /// in under the lock, and republish it to the coordination store.
    ///
    /// Called at startup and on every change notification. An error here
    /// means the retry budget is exhausted — the process cannot score
    /// without configuration, so callers treat it as fatal.
    pub async fn load_roster(&self) -> Result<(), SchedulerError> {
        let teams =
            with_quadratic_retry("load teams", DEFAULT_MAX_ATTEMPTS, || self.store.load_teams())
                .await?;
        let services = with_quadratic_retry("load services", DEFAULT_MAX_ATTEMPTS, || {
            self.store.load_services()
        })
        .await?;

        let mut roster = self.roster.lock().await;
        *roster = Roster::partition(teams, services, Utc::now());
        self.coord.put_teams(&roster.teams).await?;
        self.coord.put_services(&roster.active).await?;
        // Workers learn of the new roster on the next tick's signal.
        self.reload_pending.store(true, Ordering::SeqCst);

        info!(
            teams = roster.teams.len(),
            active = roster.active.len(),
            unstarted = roster.unstarted.len(),
            "roster loaded and published"
        );
        Ok(())
    }

    /// Drive the tick loop from event start to event end.
    ///
    /// `break_rx` delivers the remaining duration of a scheduled break the
    /// moment it begins; the ticker stops for exactly that long. Nothing
    /// past startup can abort this loop — it ends only at event end or on
    /// the stop signal.
    pub async fn run(&self, mut break_rx: mpsc::Receiver<Duration>) {
        let now = Utc::now();
        if self.event.ended(now) {
            warn!("event window already over, nothing to schedule");
            return;
        }
        if !self.event.started(now) {
            let wait = (self.event.starts_at - now).to_std().unwrap_or_default();
            info!(starts_at = %self.event.starts_at, "waiting for event start");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.shutdown.notified() => return,
            }
        }

        info!("event active, starting tick loop");
        let mut ticker = tokio::time::interval(self.interval);
        let mut breaks_done = false;

        loop {
            let now = Utc::now();
            if self.event.ended(now) {
                info!("event window ended, stopping");
                return;
            }
            let until_end = (self.event.ends_at - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = ticker.tick() => {
                    self.run_tick().await;
                }
                pause = break_rx.recv(), if !breaks_done => {
                    match pause {
                        Some(remaining) => {
                            info!(secs = remaining.as_secs(), "scheduled break, pausing dispatch");
                            tokio::select! {
                                _ = tokio::time::sleep(remaining) => {}
                                _ = self.shutdown.notified() => return,
                            }
                            info!("break over, resuming dispatch");
                            ticker.reset();
                        }
                        None => breaks_done = true,
                    }
                }
                _ = tokio::time::sleep(until_end) => {
                    info!("event window ended, stopping");
                    return;
                }
                _ = self.shutdown.notified() => {
                    info!("stop signal received, unwinding");
                    return;
                }
            }
        }
    }

    /// One scoring cycle: jitter, promote, dispatch, collect, persist.
    ///
    /// Every failure is absorbed here — a broker blip, a receiver timeout,
    /// a batch-size fault, or exhausted persistence retries void the tick
    /// and the loop carries on. Only the roster-load path is fatal.
    pub async fn run_tick(&self) {
        // Desynchronize probe traffic from the wall-clock tick boundary.
        let jitter = jitter_duration(self.interval, self.check_timeout);
        debug!(jitter_secs = jitter.as_secs(), "tick jitter");
        tokio::select! {
            _ = tokio::time::sleep(jitter) => {}
            _ = self.shutdown.notified() => return,
        }

        let mut roster = self.roster.lock().await;

        let promoted = roster.promote(Utc::now());
        if promoted > 0 {
            info!(promoted, "services reached their start time");
        }
        if !roster.dispatchable() {
            // Promotions workers never heard about must still reach them
            // once there is something to dispatch.
            if promoted > 0 {
                self.reload_pending.store(true, Ordering::SeqCst);
            }
            debug!("no active teams/services, skipping dispatch");
            return;
        }

        // Consumed only on ticks that actually dispatch, so a pending
        // reload survives empty-roster cycles.
        let reload = self.reload_pending.swap(false, Ordering::SeqCst);

        let signal = if promoted > 0 || reload {
            Signal::ReloadThenRun
        } else {
            Signal::Run
        };

        if let Err(e) = self.dispatch(&roster, promoted > 0, signal).await {
            // The broker being momentarily unreachable costs one cycle, not
            // the event. Workers may have missed this roster state, so the
            // next successful dispatch escalates.
            self.reload_pending.store(true, Ordering::SeqCst);
            warn!(error = %e, "coordination store unavailable, voiding tick");
            return;
        }
        let stamp = Utc::now();

        let wait = self.check_timeout + COLLECT_SLACK;
        let expected_per_team = roster.checks_per_team();

        let mut receivers = JoinSet::new();
        for team in roster.teams.iter().cloned() {
            let coord = self.coord.clone();
            receivers.spawn(async move {
                match coord.pop_results(&team.addr, wait).await {
                    Ok(Some(batch)) => TeamCollection::Batch { team, batch },
                    Ok(None) => TeamCollection::TimedOut { team },
                    Err(error) => TeamCollection::Failed { team, error },
                }
            });
        }

        let mut results: Vec<ServiceCheckResult> =
            Vec::with_capacity(expected_per_team * roster.teams.len());
        let mut voided = false;

        while let Some(joined) = receivers.join_next().await {
            match joined {
                Ok(TeamCollection::Batch { team, batch }) => {
                    if batch.len() != expected_per_team {
                        // A wrong-sized batch is a scheduler/worker fault,
                        // not a team being down; log it apart so operators
                        // can tell the two conditions apart.
                        error!(
                            team = %team.name,
                            got = batch.len(),
                            expected = expected_per_team,
                            "result batch size mismatch, voiding tick"
                        );
                        voided = true;
                    } else {
                        results.extend(batch.into_iter().map(|mut r| {
                            r.timestamp = stamp;
                            r
                        }));
                    }
                }
                Ok(TeamCollection::TimedOut { team }) => {
                    warn!(team = %team.name, "no results before deadline, voiding tick");
                    voided = true;
                }
                Ok(TeamCollection::Failed { team, error }) => {
                    warn!(team = %team.name, error = %error, "result receive failed, voiding tick");
                    voided = true;
                }
                Err(e) => {
                    error!(error = %e, "result receiver panicked, voiding tick");
                    voided = true;
                }
            }
        }

        if voided {
            // Correctness over completeness: a partial batch under a fresh
            // timestamp would corrupt the scoreboard.
            warn!("tick discarded, no scores persisted this cycle");
            return;
        }

        match with_quadratic_retry("insert results", DEFAULT_MAX_ATTEMPTS, || {
            self.store.insert_results(&results)
        })
        .await
        {
            Ok(()) => info!(count = results.len(), timestamp = %stamp, "tick scored"),
            Err(e) => {
                // One lost cycle must not stall the event.
                error!(error = %e, "scoring cycle lost: results could not be persisted");
            }
        }
    }

    /// Push one tick's state to the coordination store and fire the signal:
    /// republished roster if anything promoted, flushed queues so receivers
    /// can only see this tick's data, refreshed timeout, then the signal.
    async fn dispatch(
        &self,
        roster: &Roster,
        republish: bool,
        signal: Signal,
    ) -> Result<(), CoordError> {
        if republish {
            self.coord.put_services(&roster.active).await?;
        }
        for team in &roster.teams {
            self.coord.clear_results(&team.addr).await?;
        }
        self.coord.set_check_timeout(self.check_timeout).await?;
        self.coord.publish_signal(signal).await?;
        Ok(())
    }
}

/// Uniform random jitter in `[0, interval − timeout)`, minimum one second.
fn jitter_duration(interval: Duration, check_timeout: Duration) -> Duration {
    let range_secs = interval.saturating_sub(check_timeout).as_secs();
    let secs = if range_secs <= 1 {
        1
    } else {
        rand::thread_rng().gen_range(0..range_secs).max(1)
    };
    Duration::from_secs(secs)
}


#[cfg(test)]
mod tests {
    use super::test_support::{past, service, team, FlakyCoordStore, MockScoreStore};
    use super::*;
    use chrono::TimeZone;

    use scorebox_coord::MemoryCoordStore;
    use scorebox_core::Outcome;

    fn far_future() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap()
    }

    fn scheduler(coord: Arc<dyn CoordStore>, store: Arc<MockScoreStore>) -> Scheduler {
        let event = EventWindow {
            starts_at: past(),
            ends_at: far_future(),
            breaks: vec![],
        };
        Scheduler::new(
            coord,
            store,
            event,
            Duration::from_secs(60),
            Duration::from_secs(20),
            Arc::new(Notify::new()),
        )
    }

    /// Simulated worker: answers each signal with one batch per listed team.
    /// `per_team` controls how many records each batch carries.
    async fn spawn_fake_worker(
        coord: Arc<dyn CoordStore>,
        teams: Vec<(i32, &'static str)>,
        services: Vec<i32>,
        per_team_override: Option<usize>,
    ) {
        let mut sub = coord.subscribe_signals().await.unwrap();
        tokio::spawn(async move {
            while sub.recv().await.is_ok() {
                for (team_id, addr) in &teams {
                    let ids: Vec<i32> = match per_team_override {
                        Some(n) => (0..n as i32).collect(),
                        None => services.clone(),
                    };
                    let batch: Vec<ServiceCheckResult> = ids
                        .iter()
                        .map(|sid| ServiceCheckResult {
                            team_id: *team_id,
                            service_id: *sid,
                            timestamp: past(),
                            outcome: Outcome::Pass,
                            exit_code: 0,
                        })
                        .collect();
                    coord.push_results(addr, &batch).await.unwrap();
                }
            }
        });
    }

    // ── Tests ────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn successful_tick_persists_one_stamped_batch() {
        let coord = Arc::new(MemoryCoordStore::new());
        let store = Arc::new(MockScoreStore::new(
            vec![team(1, "11"), team(2, "12")],
            vec![service(10)],
        ));
        let sched = scheduler(coord.clone(), store.clone());
        sched.load_roster().await.unwrap();

        spawn_fake_worker(coord.clone(), vec![(1, "11"), (2, "12")], vec![10], None).await;

        sched.run_tick().await;

        let batches = store.inserted_batches().await;
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.len(), 2, "teams x active checks");
        // All records restamped with the one tick timestamp.
        assert!(batch.iter().all(|r| r.timestamp == batch[0].timestamp));
        assert!(batch[0].timestamp > past());
    }

    #[tokio::test(start_paused = true)]
    async fn receiver_timeout_voids_the_whole_tick() {
        let coord = Arc::new(MemoryCoordStore::new());
        let store = Arc::new(MockScoreStore::new(
            vec![team(1, "11"), team(2, "12")],
            vec![service(10)],
        ));
        let sched = scheduler(coord.clone(), store.clone());
        sched.load_roster().await.unwrap();

        // Only team 11 ever reports.
        spawn_fake_worker(coord.clone(), vec![(1, "11")], vec![10], None).await;

        sched.run_tick().await;

        assert!(
            store.inserted_batches().await.is_empty(),
            "partial tick must not be persisted"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_batch_voids_the_tick() {
        let coord = Arc::new(MemoryCoordStore::new());
        let store = Arc::new(MockScoreStore::new(
            vec![team(1, "11")],
            vec![service(10)],
        ));
        let sched = scheduler(coord.clone(), store.clone());
        sched.load_roster().await.unwrap();

        // Three records for a one-service roster.
        spawn_fake_worker(coord.clone(), vec![(1, "11")], vec![], Some(3)).await;

        sched.run_tick().await;
        assert!(store.inserted_batches().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_active_set_skips_dispatch() {
        let coord = Arc::new(MemoryCoordStore::new());
        let store = Arc::new(MockScoreStore::new(vec![team(1, "11")], vec![]));
        let sched = scheduler(coord.clone(), store.clone());
        sched.load_roster().await.unwrap();

        sched.run_tick().await;

        assert!(coord.published_signals().await.is_empty(), "no dispatch");
        assert!(store.inserted_batches().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reload_escalates_first_signal_then_plain_run() {
        let coord = Arc::new(MemoryCoordStore::new());
        let store = Arc::new(MockScoreStore::new(
            vec![team(1, "11")],
            vec![service(10)],
        ));
        let sched = scheduler(coord.clone(), store.clone());
        sched.load_roster().await.unwrap();

        spawn_fake_worker(coord.clone(), vec![(1, "11")], vec![10], None).await;

        sched.run_tick().await;
        sched.run_tick().await;

        assert_eq!(
            coord.published_signals().await,
            vec![Signal::ReloadThenRun, Signal::Run]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_is_retried_through_transient_failures() {
        let coord = Arc::new(MemoryCoordStore::new());
        let store = Arc::new(MockScoreStore::new(
            vec![team(1, "11")],
            vec![service(10)],
        ));
        store.fail_next_inserts(2);
        let sched = scheduler(coord.clone(), store.clone());
        sched.load_roster().await.unwrap();

        spawn_fake_worker(coord.clone(), vec![(1, "11")], vec![10], None).await;

        sched.run_tick().await;
        assert_eq!(store.inserted_batches().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_persistence_retries_do_not_abort() {
        let coord = Arc::new(MemoryCoordStore::new());
        let store = Arc::new(MockScoreStore::new(
            vec![team(1, "11")],
            vec![service(10)],
        ));
        store.fail_next_inserts(u32::MAX);
        let sched = scheduler(coord.clone(), store.clone());
        sched.load_roster().await.unwrap();

        spawn_fake_worker(coord.clone(), vec![(1, "11")], vec![10], None).await;

        // The cycle is lost but the scheduler survives for the next tick.
        sched.run_tick().await;
        assert!(store.inserted_batches().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn roster_load_retries_then_succeeds() {
        let coord = Arc::new(MemoryCoordStore::new());
        let store = Arc::new(MockScoreStore::new(
            vec![team(1, "11")],
            vec![service(10)],
        ));
        store.fail_next_loads(2);
        let sched = scheduler(coord.clone(), store.clone());

        sched.load_roster().await.unwrap();
        assert_eq!(store.load_calls.load(Ordering::SeqCst), 3);
        // Roster landed in the coordination store.
        assert!(coord.team("11").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn roster_load_exhaustion_is_fatal() {
        let coord = Arc::new(MemoryCoordStore::new());
        let store = Arc::new(MockScoreStore::new(vec![], vec![]));
        store.fail_next_loads(u32::MAX);
        let sched = scheduler(coord, store);

        assert!(matches!(
            sched.load_roster().await,
            Err(SchedulerError::Roster(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn broker_blip_voids_the_tick_and_the_next_one_recovers() {
        let coord = Arc::new(FlakyCoordStore::new());
        let store = Arc::new(MockScoreStore::new(
            vec![team(1, "11")],
            vec![service(10)],
        ));
        let sched = scheduler(coord.clone(), store.clone());
        sched.load_roster().await.unwrap();

        spawn_fake_worker(coord.clone(), vec![(1, "11")], vec![10], None).await;

        // One unreachable-broker cycle: nothing dispatched, nothing scored,
        // and crucially no error escapes the tick.
        coord.fail_next_clears(1);
        sched.run_tick().await;
        assert!(store.inserted_batches().await.is_empty());
        assert!(coord.inner.published_signals().await.is_empty());

        // Broker back: scoring resumes, and the missed roster state reaches
        // workers through an escalated signal.
        sched.run_tick().await;
        assert_eq!(store.inserted_batches().await.len(), 1);
        assert_eq!(
            coord.inner.published_signals().await,
            vec![Signal::ReloadThenRun]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn break_stops_the_ticker_until_it_elapses() {
        let coord = Arc::new(MemoryCoordStore::new());
        let store = Arc::new(MockScoreStore::new(
            vec![team(1, "11")],
            vec![service(10)],
        ));
        let shutdown = Arc::new(Notify::new());
        let event = EventWindow {
            starts_at: past(),
            ends_at: far_future(),
            breaks: vec![],
        };
        let sched = Arc::new(Scheduler::new(
            coord.clone(),
            store.clone(),
            event,
            Duration::from_secs(60),
            Duration::from_secs(20),
            shutdown.clone(),
        ));
        sched.load_roster().await.unwrap();
        spawn_fake_worker(coord.clone(), vec![(1, "11")], vec![10], None).await;

        let mut sub = coord.subscribe_signals().await.unwrap();
        let (break_tx, break_rx) = mpsc::channel(1);
        let loop_sched = sched.clone();
        let handle = tokio::spawn(async move { loop_sched.run(break_rx).await });

        // First tick dispatches, then the break lands before the next one.
        sub.recv().await.unwrap();
        break_tx.send(Duration::from_secs(10_000)).await.unwrap();

        // Well past several tick intervals into the pause: still silent.
        let during = tokio::time::timeout(Duration::from_secs(5_000), sub.recv()).await;
        assert!(during.is_err(), "no dispatch while paused");

        // Once the pause elapses the fresh ticker dispatches again.
        tokio::time::timeout(Duration::from_secs(10_000), sub.recv())
            .await
            .expect("dispatch resumes after the break")
            .unwrap();

        shutdown.notify_one();
        handle.await.unwrap();
    }

    #[test]
    fn jitter_stays_inside_the_window() {
        let interval = Duration::from_secs(60);
        let timeout = Duration::from_secs(20);
        for _ in 0..200 {
            let j = jitter_duration(interval, timeout);
            assert!(j >= Duration::from_secs(1));
            assert!(j < interval - timeout);
        }
        // Degenerate window still yields the one-second minimum.
        assert_eq!(
            jitter_duration(Duration::from_secs(2), Duration::from_secs(2)),
            Duration::from_secs(1)
        );
    }
}
