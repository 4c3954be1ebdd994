//! In-memory coordination store for tests.
//!
//! Implements the full [`CoordStore`] contract over process-local state so
//! scheduler and worker logic can be exercised without a broker. Values are
//! stored as serialized JSON, matching what the Redis backend puts on the
//! wire.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, Notify};

use scorebox_core::{ServiceCheckResult, ServiceDef, Team};

use crate::error::CoordError;
use crate::signal::Signal;
use crate::store::{CoordStore, SignalSubscription};

#[derive(Default)]
struct Inner {
    timeout_secs: Option<u64>,
    services: Option<String>,
    teams: HashMap<String, String>,
    queues: HashMap<String, VecDeque<String>>,
    signals: Vec<Signal>,
}

/// Shared in-memory stand-in for the broker.
pub struct MemoryCoordStore {
    inner: Mutex<Inner>,
    signal_tx: broadcast::Sender<i64>,
    queue_notify: Mutex<HashMap<String, Arc<Notify>>>,
}

impl MemoryCoordStore {
    pub fn new() -> Self {
        let (signal_tx, _) = broadcast::channel(16);
        Self {
            inner: Mutex::new(Inner::default()),
            signal_tx,
            queue_notify: Mutex::new(HashMap::new()),
        }
    }

    /// Every signal published so far, in order.
    pub async fn published_signals(&self) -> Vec<Signal> {
        self.inner.lock().await.signals.clone()
    }

    async fn notify_for(&self, addr: &str) -> Arc<Notify> {
        self.queue_notify
            .lock()
            .await
            .entry(addr.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }
}

impl Default for MemoryCoordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordStore for MemoryCoordStore {
    async fn publish_signal(&self, signal: Signal) -> Result<(), CoordError> {
        self.inner.lock().await.signals.push(signal);
        // No subscribers is fine — PUB/SUB drops unobserved messages too.
        let _ = self.signal_tx.send(signal.code());
        Ok(())
    }

    async fn subscribe_signals(&self) -> Result<Box<dyn SignalSubscription>, CoordError> {
        Ok(Box::new(MemorySignalSubscription {
            rx: self.signal_tx.subscribe(),
        }))
    }

    async fn set_check_timeout(&self, timeout: Duration) -> Result<(), CoordError> {
        self.inner.lock().await.timeout_secs = Some(timeout.as_secs());
        Ok(())
    }

    async fn check_timeout(&self) -> Result<Duration, CoordError> {
        self.inner
            .lock()
            .await
            .timeout_secs
            .map(Duration::from_secs)
            .ok_or_else(|| CoordError::MissingKey(crate::keys::TIMEOUT_KEY.into()))
    }

    async fn put_services(&self, services: &[ServiceDef]) -> Result<(), CoordError> {
        let blob = serde_json::to_string(services)?;
        self.inner.lock().await.services = Some(blob);
        Ok(())
    }

    async fn services(&self) -> Result<Vec<ServiceDef>, CoordError> {
        let inner = self.inner.lock().await;
        let blob = inner
            .services
            .as_ref()
            .ok_or_else(|| CoordError::MissingKey(crate::keys::SERVICES_KEY.into()))?;
        Ok(serde_json::from_str(blob)?)
    }

    async fn put_teams(&self, teams: &[Team]) -> Result<(), CoordError> {
        let mut inner = self.inner.lock().await;
        inner.teams.clear();
        for team in teams {
            inner
                .teams
                .insert(team.addr.clone(), serde_json::to_string(team)?);
        }
        Ok(())
    }

    async fn team(&self, addr: &str) -> Result<Option<Team>, CoordError> {
        match self.inner.lock().await.teams.get(addr) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn clear_results(&self, addr: &str) -> Result<(), CoordError> {
        self.inner.lock().await.queues.remove(addr);
        Ok(())
    }

    async fn push_results(
        &self,
        addr: &str,
        batch: &[ServiceCheckResult],
    ) -> Result<(), CoordError> {
        let blob = serde_json::to_string(batch)?;
        self.inner
            .lock()
            .await
            .queues
            .entry(addr.to_string())
            .or_default()
            .push_back(blob);
        self.notify_for(addr).await.notify_one();
        Ok(())
    }

    async fn pop_results(
        &self,
        addr: &str,
        wait: Duration,
    ) -> Result<Option<Vec<ServiceCheckResult>>, CoordError> {
        let notify = self.notify_for(addr).await;
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            if let Some(blob) = self
                .inner
                .lock()
                .await
                .queues
                .get_mut(addr)
                .and_then(|q| q.pop_front())
            {
                return Ok(Some(serde_json::from_str(&blob)?));
            }

            if tokio::time::timeout_at(deadline, notify.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }
}

struct MemorySignalSubscription {
    rx: broadcast::Receiver<i64>,
}

#[async_trait]
impl SignalSubscription for MemorySignalSubscription {
    async fn recv(&mut self) -> Result<Signal, CoordError> {
        loop {
            match self.rx.recv().await {
                Ok(code) => return Signal::from_code(code),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(CoordError::ChannelClosed)
                }
            }
        }
    }
}
