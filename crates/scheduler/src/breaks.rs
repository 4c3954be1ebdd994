use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info};

use scorebox_core::EventWindow;

/// Watch the event's scheduled breaks and tell the tick loop to pause.
///
/// For each upcoming break this sleeps until its start, then sends the
/// remaining break duration (computed at that moment, so a loop started
/// mid-break pauses only for what is left) down `tx`. Returns once no
/// breaks remain or the event window closes.
pub async fn run_break_loop(
    event: EventWindow,
    tx: mpsc::Sender<Duration>,
    shutdown: Arc<Notify>,
) {
    loop {
        let now = Utc::now();
        if event.ended(now) {
            debug!("event over, break loop done");
            return;
        }
        let Some(brk) = event.next_break(now) else {
            debug!("no scheduled breaks remain");
            return;
        };

        if let Ok(until_start) = (brk.starts_at - now).to_std() {
            tokio::select! {
                _ = tokio::time::sleep(until_start) => {}
                _ = shutdown.notified() => return,
            }
        }

        // Recompute against the clock: the sleep may have overshot, or the
        // process may have started inside this break.
        if let Some(remaining) = brk.remaining(Utc::now()) {
            info!(secs = remaining.as_secs(), "scheduled break starting");
            if tx.send(remaining).await.is_err() {
                // Tick loop is gone; nothing left to pause.
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(remaining) => {}
                _ = shutdown.notified() => return,
            }
        }
    }
}
