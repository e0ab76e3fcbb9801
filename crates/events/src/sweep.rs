//! Periodic notification sweep.
//!
//! [`NotificationSweeper`] runs as a background task and calls
//! [`NotificationDispatcher::dispatch_pending`] on a fixed interval, so
//! alerts created by the historical backfill or left with a failed channel
//! are delivered without waiting for the next bulletin run.

use std::sync::Arc;
use std::time::Duration;

use litis_db::DbPool;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::NotificationDispatcher;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Background service that periodically dispatches pending alerts.
pub struct NotificationSweeper {
    pool: DbPool,
    dispatcher: Arc<NotificationDispatcher>,
    interval: Duration,
}

impl NotificationSweeper {
    pub fn new(pool: DbPool, dispatcher: Arc<NotificationDispatcher>, interval: Duration) -> Self {
        Self {
            pool,
            dispatcher,
            interval,
        }
    }

    /// Run the sweep loop until `cancel` is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.interval.as_secs(), "Notification sweeper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification sweeper cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.dispatcher.dispatch_pending(&self.pool).await {
                        tracing::error!(error = %e, "Notification sweep failed");
                    }
                }
            }
        }
    }
}
