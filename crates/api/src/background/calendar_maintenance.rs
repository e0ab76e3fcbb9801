//! Periodic calendar maintenance.
//!
//! Runs the same pass as `GET /cron/calendar-maintenance` on a fixed
//! interval, so lost webhook notifications and expiring watch channels are
//! handled even when no external scheduler is configured.

use std::sync::Arc;
use std::time::Duration;

use litis_calendar::CalendarSyncEngine;
use tokio_util::sync::CancellationToken;

/// Run the maintenance loop until `cancel` is triggered.
///
/// The first pass runs one full interval after startup.
pub async fn run(engine: Arc<CalendarSyncEngine>, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Calendar maintenance job started");

    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Calendar maintenance job stopping");
                break;
            }
            _ = interval.tick() => {
                match engine.run_maintenance().await {
                    Ok(report) if report.calendars == 0 => {
                        tracing::debug!("Calendar maintenance: no connected calendars");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "Calendar maintenance: pass failed");
                    }
                }
            }
        }
    }
}
