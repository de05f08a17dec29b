//! Periodic housekeeping: completing elapsed lessons and expiring OAuth states.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::state::AppState;

/// Run one sweep.
pub async fn sweep_once(state: &AppState, now: chrono::NaiveDateTime) {
    match state.engine.complete_elapsed(now).await {
        Ok(count) => debug!(count, "Completion sweep finished"),
        Err(e) => warn!(error = %e, "Completion sweep failed"),
    }

    if let Err(e) = state.authorizer.prune_states().await {
        warn!(error = %e, "Pruning OAuth states failed");
    }
}

/// Sweep every `interval` on the server's local clock.
pub fn spawn(state: AppState, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_once(&state, chrono::Local::now().naive_local()).await;
        }
    })
}
