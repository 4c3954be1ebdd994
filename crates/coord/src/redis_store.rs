use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info};

use scorebox_core::{ServiceCheckResult, ServiceDef, Team};

use crate::error::CoordError;
use crate::keys;
use crate::signal::Signal;
use crate::store::{CoordStore, SignalSubscription};

/// Redis-backed coordination store.
///
/// Signals ride PUBLISH/SUBSCRIBE on one channel; the timeout and roster
/// live under plain keys (services as one JSON blob, teams as a hash keyed
/// by address); result queues are Redis lists popped with BLPOP.
pub struct RedisCoordStore {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisCoordStore {
    /// Connect to the broker at the given URL (`redis://host:port`).
    pub async fn connect(url: &str) -> Result<Self, CoordError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!(url = %url, "connected to coordination store");
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl CoordStore for RedisCoordStore {
    async fn publish_signal(&self, signal: Signal) -> Result<(), CoordError> {
        let mut conn = self.conn.clone();
        let _: () = conn.publish(keys::SIGNAL_CHANNEL, signal.code()).await?;
        debug!(signal = %signal, "published signal");
        Ok(())
    }

    async fn subscribe_signals(&self) -> Result<Box<dyn SignalSubscription>, CoordError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(keys::SIGNAL_CHANNEL).await?;
        info!(channel = keys::SIGNAL_CHANNEL, "subscribed to signal channel");
        Ok(Box::new(RedisSignalSubscription {
            stream: Box::pin(pubsub.into_on_message()),
        }))
    }

    async fn set_check_timeout(&self, timeout: Duration) -> Result<(), CoordError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(keys::TIMEOUT_KEY, timeout.as_secs()).await?;
        Ok(())
    }

    async fn check_timeout(&self) -> Result<Duration, CoordError> {
        let mut conn = self.conn.clone();
        let secs: Option<u64> = conn.get(keys::TIMEOUT_KEY).await?;
        secs.map(Duration::from_secs)
            .ok_or_else(|| CoordError::MissingKey(keys::TIMEOUT_KEY.into()))
    }

    async fn put_services(&self, services: &[ServiceDef]) -> Result<(), CoordError> {
        let blob = serde_json::to_string(services)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(keys::SERVICES_KEY, blob).await?;
        debug!(count = services.len(), "published service roster");
        Ok(())
    }

    async fn services(&self) -> Result<Vec<ServiceDef>, CoordError> {
        let mut conn = self.conn.clone();
        let blob: Option<String> = conn.get(keys::SERVICES_KEY).await?;
        let blob = blob.ok_or_else(|| CoordError::MissingKey(keys::SERVICES_KEY.into()))?;
        Ok(serde_json::from_str(&blob)?)
    }

    async fn put_teams(&self, teams: &[Team]) -> Result<(), CoordError> {
        let mut entries = Vec::with_capacity(teams.len());
        for team in teams {
            entries.push((team.addr.clone(), serde_json::to_string(team)?));
        }
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys::TEAMS_KEY).await?;
        if !entries.is_empty() {
            let _: () = conn.hset_multiple(keys::TEAMS_KEY, &entries).await?;
        }
        debug!(count = teams.len(), "published team records");
        Ok(())
    }

    async fn team(&self, addr: &str) -> Result<Option<Team>, CoordError> {
        let mut conn = self.conn.clone();
        let record: Option<String> = conn.hget(keys::TEAMS_KEY, addr).await?;
        match record {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn clear_results(&self, addr: &str) -> Result<(), CoordError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys::results_key(addr)).await?;
        Ok(())
    }

    async fn push_results(
        &self,
        addr: &str,
        batch: &[ServiceCheckResult],
    ) -> Result<(), CoordError> {
        let blob = serde_json::to_string(batch)?;
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(keys::results_key(addr), blob).await?;
        debug!(addr = %addr, count = batch.len(), "pushed result batch");
        Ok(())
    }

    async fn pop_results(
        &self,
        addr: &str,
        wait: Duration,
    ) -> Result<Option<Vec<ServiceCheckResult>>, CoordError> {
        // A blocking pop parks its connection, and each team's receiver pops
        // concurrently, so every call gets a dedicated connection.
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let popped: Option<(String, String)> = conn
            .blpop(keys::results_key(addr), keys::wait_secs(wait) as f64)
            .await?;
        match popped {
            Some((_key, blob)) => Ok(Some(serde_json::from_str(&blob)?)),
            None => Ok(None),
        }
    }
}

struct RedisSignalSubscription {
    stream: Pin<Box<dyn Stream<Item = redis::Msg> + Send>>,
}

#[async_trait]
impl SignalSubscription for RedisSignalSubscription {
    async fn recv(&mut self) -> Result<Signal, CoordError> {
        let msg = self.stream.next().await.ok_or(CoordError::ChannelClosed)?;
        let code: i64 = msg.get_payload()?;
        Signal::from_code(code)
    }
}
