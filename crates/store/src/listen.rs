use async_trait::async_trait;
use sqlx::postgres::PgListener;
use tracing::{debug, info};

use crate::error::StoreError;

/// LISTEN/NOTIFY channel raised by the roster triggers when administrators
/// edit teams or services.
pub const CONFIG_CHANNEL: &str = "scorebox_config_changed";

/// A persistent subscription to roster-change notifications.
///
/// Trait seam so the scheduler's listener loop can be driven by a fake in
/// tests. The payload (which table changed) is informational only — every
/// notification triggers a full reload.
#[async_trait]
pub trait ChangeSubscription: Send {
    /// Block until the next change notification arrives.
    async fn recv(&mut self) -> Result<(), StoreError>;
}

/// Postgres LISTEN-based [`ChangeSubscription`].
pub struct PgChangeListener {
    listener: PgListener,
}

impl PgChangeListener {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let mut listener = PgListener::connect(url).await?;
        listener.listen(CONFIG_CHANNEL).await?;
        info!(channel = CONFIG_CHANNEL, "listening for roster changes");
        Ok(Self { listener })
    }
}

#[async_trait]
impl ChangeSubscription for PgChangeListener {
    async fn recv(&mut self) -> Result<(), StoreError> {
        let notification = self.listener.recv().await?;
        debug!(payload = notification.payload(), "roster change notification");
        Ok(())
    }
}
