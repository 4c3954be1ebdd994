use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use scorebox_core::{ServiceCheckResult, ServiceDef, Team};

use crate::error::CoordError;
use crate::signal::Signal;

/// A live subscription to the master's signal channel.
///
/// Workers hold one of these for their whole lifetime; a receive error here
/// is unrecoverable for the worker process.
#[async_trait]
pub trait SignalSubscription: Send {
    /// Receive the next signal. Blocks until one arrives.
    async fn recv(&mut self) -> Result<Signal, CoordError>;
}

/// The shared coordination surface between the master and its workers.
///
/// One broadcast channel, a timeout key, the serialized roster, and one
/// result queue per team address. Every publish reaches all currently
/// subscribed workers at least once; deduplication of effects is the
/// master's job, not the transport's.
#[async_trait]
pub trait CoordStore: Send + Sync {
    // ── Signal channel ───────────────────────────────────────────────

    async fn publish_signal(&self, signal: Signal) -> Result<(), CoordError>;

    async fn subscribe_signals(&self) -> Result<Box<dyn SignalSubscription>, CoordError>;

    // ── Key/value surface ────────────────────────────────────────────

    /// Refresh the probe timeout workers read before each run.
    async fn set_check_timeout(&self, timeout: Duration) -> Result<(), CoordError>;

    async fn check_timeout(&self) -> Result<Duration, CoordError>;

    /// Replace the active service roster (one serialized blob).
    async fn put_services(&self, services: &[ServiceDef]) -> Result<(), CoordError>;

    async fn services(&self) -> Result<Vec<ServiceDef>, CoordError>;

    /// Replace all team records, keyed by identifying address.
    async fn put_teams(&self, teams: &[Team]) -> Result<(), CoordError>;

    async fn team(&self, addr: &str) -> Result<Option<Team>, CoordError>;

    // ── Per-team result queues ───────────────────────────────────────

    /// Drop any stale batches so the next pop only sees this tick's data.
    async fn clear_results(&self, addr: &str) -> Result<(), CoordError>;

    /// Append one result batch to a team's queue.
    async fn push_results(
        &self,
        addr: &str,
        batch: &[ServiceCheckResult],
    ) -> Result<(), CoordError>;

    /// Blocking-pop one batch from a team's queue.
    ///
    /// Waits at most `wait` (rounded up to whole seconds by the backend);
    /// `None` means the deadline expired with no batch.
    async fn pop_results(
        &self,
        addr: &str,
        wait: Duration,
    ) -> Result<Option<Vec<ServiceCheckResult>>, CoordError>;
}

/// Blanket impl so `Arc<dyn CoordStore>` works wherever the trait is wanted.
#[async_trait]
impl<T: CoordStore + ?Sized> CoordStore for Arc<T> {
    async fn publish_signal(&self, signal: Signal) -> Result<(), CoordError> {
        (**self).publish_signal(signal).await
    }

    async fn subscribe_signals(&self) -> Result<Box<dyn SignalSubscription>, CoordError> {
        (**self).subscribe_signals().await
    }

    async fn set_check_timeout(&self, timeout: Duration) -> Result<(), CoordError> {
        (**self).set_check_timeout(timeout).await
    }

    async fn check_timeout(&self) -> Result<Duration, CoordError> {
        (**self).check_timeout().await
    }

    async fn put_services(&self, services: &[ServiceDef]) -> Result<(), CoordError> {
        (**self).put_services(services).await
    }

    async fn services(&self) -> Result<Vec<ServiceDef>, CoordError> {
        (**self).services().await
    }

    async fn put_teams(&self, teams: &[Team]) -> Result<(), CoordError> {
        (**self).put_teams(teams).await
    }

    async fn team(&self, addr: &str) -> Result<Option<Team>, CoordError> {
        (**self).team(addr).await
    }

    async fn clear_results(&self, addr: &str) -> Result<(), CoordError> {
        (**self).clear_results(addr).await
    }

    async fn push_results(
        &self,
        addr: &str,
        batch: &[ServiceCheckResult],
    ) -> Result<(), CoordError> {
        (**self).push_results(addr, batch).await
    }

    async fn pop_results(
        &self,
        addr: &str,
        wait: Duration,
    ) -> Result<Option<Vec<ServiceCheckResult>>, CoordError> {
        (**self).pop_results(addr, wait).await
    }
}
