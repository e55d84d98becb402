//! Rotation service: scheduled trimming of the trace log.
//!
//! DESIGN
//! ======
//! A background task ticks on a fixed interval (daily by default) and asks
//! the trace context to rotate. The first tick fires immediately, so a log
//! that grew past its limit while the service was down is trimmed at startup.
//! File work runs on a blocking thread to keep the runtime responsive.
//!
//! ERROR HANDLING
//! ==============
//! A failed rotation is logged and retried on the next tick. The log keeps
//! growing until then, which is preferable to losing the task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracestore::RotateOutcome;
use tracing::{debug, error, info};

use crate::state::AppState;

/// Spawn the background rotation task. Returns a handle for shutdown.
pub fn spawn_rotation_task(state: AppState, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "trace rotation scheduled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let _ = run_rotation(&state).await;
        }
    })
}

/// Run one rotation pass. Returns `None` when the pass failed.
pub async fn run_rotation(state: &AppState) -> Option<RotateOutcome> {
    let trace = Arc::clone(&state.trace);
    match tokio::task::spawn_blocking(move || trace.rotate_if_needed()).await {
        Ok(Ok(outcome)) => {
            match outcome {
                RotateOutcome::Rotated { before, after } => info!(before, after, "trace log rotated"),
                RotateOutcome::Skipped { size } => debug!(size, "trace log under limit"),
            }
            Some(outcome)
        }
        Ok(Err(e)) => {
            error!(error = %e, "trace rotation failed");
            None
        }
        Err(e) => {
            error!(error = %e, "trace rotation task aborted");
            None
        }
    }
}

#[cfg(test)]
#[path = "rotation_test.rs"]
mod tests;
