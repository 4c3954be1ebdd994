use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{info, warn};

use scorebox_store::ChangeSubscription;

use crate::error::SchedulerError;
use crate::scheduler::Scheduler;

/// React to roster edits for the lifetime of the event.
///
/// Each notification from the relational store triggers a full roster
/// reload and republish. Reload retries happen inside
/// [`Scheduler::load_roster`]; if even those are exhausted the master is
/// running on configuration it knows is stale, so the error propagates and
/// takes the process down.
pub async fn run_change_listener(
    scheduler: Arc<Scheduler>,
    mut subscription: Box<dyn ChangeSubscription>,
    shutdown: Arc<Notify>,
) -> Result<(), SchedulerError> {
    loop {
        tokio::select! {
            changed = subscription.recv() => {
                if let Err(e) = changed {
                    warn!(error = %e, "change subscription lost");
                    return Err(e.into());
                }
                info!("roster change notified, reloading");
                scheduler.load_roster().await?;
            }
            _ = shutdown.notified() => {
                info!("stop signal received, change listener done");
                return Ok(());
            }
        }
    }
}
