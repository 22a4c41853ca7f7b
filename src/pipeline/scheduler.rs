//! Fixed-interval scheduling of pipeline runs.
//!
//! The scheduler is a thin collaborator: it ticks, invokes `run()` and
//! reads the structured summary it returns. There is no implicit event
//! channel; the summary is the whole contract.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::Pipeline;
use crate::types::RunSource;
use crate::upstream::OrderBookApi;

/// Start a background task running the pipeline every `interval`.
///
/// Runs never overlap from this task: a slow run delays the next tick
/// rather than stacking. Returns the `JoinHandle` so the caller can await
/// or abort the loop.
pub fn spawn_scheduled<A: OrderBookApi + 'static>(
    pipeline: Arc<Pipeline<A>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately; skip it so startup is quiet
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let summary = pipeline.run(RunSource::Scheduled).await;

            if summary.success {
                info!(
                    saved = summary.saved_to_database,
                    closed = summary.closed_orders,
                    rate_limited = summary.rate_limited.unwrap_or(false),
                    "Scheduled sync finished"
                );
            } else {
                error!(message = %summary.message, "Scheduled sync failed");
            }
        }
    })
}
