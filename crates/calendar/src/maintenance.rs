//! Periodic calendar maintenance.
//!
//! For every connected calendar: refresh credentials near expiry, renew the
//! watch channel, run an incremental inbound sync, and push pending local
//! events. Calendars are processed independently; one failing never stops
//! the others. This pass also catches up on webhook notifications that were
//! lost or timed out.

use futures::stream::{self, StreamExt};
use litis_core::types::DbId;
use litis_db::models::calendar::CalendarToken;
use litis_db::repositories::CalendarTokenRepo;
use serde::Serialize;

use crate::error::CalendarError;
use crate::sync::CalendarSyncEngine;

/// Calendars processed concurrently in one maintenance pass.
const MAINTENANCE_CONCURRENCY: usize = 4;

/// Summary of a maintenance pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaintenanceReport {
    pub calendars: u32,
    pub channels_renewed: u32,
    pub synced: u32,
    pub sync_failures: u32,
    pub events_pushed: u32,
    pub push_errors: u32,
    /// `(user_id, message)` for calendars whose maintenance failed outright.
    pub errors: Vec<(DbId, String)>,
}

#[derive(Debug, Default)]
struct CalendarOutcome {
    renewed: bool,
    synced: bool,
    pushed: u32,
    push_errors: u32,
}

impl CalendarSyncEngine {
    /// Run one maintenance pass over every connected calendar.
    pub async fn run_maintenance(&self) -> Result<MaintenanceReport, CalendarError> {
        let tokens = CalendarTokenRepo::list_connected(&self.pool).await?;
        let mut report = MaintenanceReport {
            calendars: tokens.len() as u32,
            ..MaintenanceReport::default()
        };

        let mut results = stream::iter(tokens)
            .map(|token| async move {
                let outcome = self.maintain(&token).await;
                (token, outcome)
            })
            .buffer_unordered(MAINTENANCE_CONCURRENCY);

        while let Some((token, outcome)) = results.next().await {
            match outcome {
                Ok(o) => {
                    report.channels_renewed += u32::from(o.renewed);
                    if o.synced {
                        report.synced += 1;
                    } else {
                        report.sync_failures += 1;
                    }
                    report.events_pushed += o.pushed;
                    report.push_errors += o.push_errors;
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = token.user_id,
                        calendar_id = %token.calendar_id,
                        error = %e,
                        "Calendar maintenance failed"
                    );
                    report.errors.push((token.user_id, e.to_string()));
                }
            }
        }

        tracing::info!(
            calendars = report.calendars,
            renewed = report.channels_renewed,
            synced = report.synced,
            sync_failures = report.sync_failures,
            pushed = report.events_pushed,
            errors = report.errors.len(),
            "Calendar maintenance complete"
        );
        Ok(report)
    }

    async fn maintain(&self, token: &CalendarToken) -> Result<CalendarOutcome, CalendarError> {
        // Refresh once up front so the steps below reuse the stored credentials.
        self.ensure_fresh_token(token).await?;
        let token = self.load_token(token.user_id, &token.calendar_id).await?;

        let renewed = match self.renew_if_needed(&token).await {
            Ok(channel) => channel.is_some(),
            Err(e) => {
                tracing::warn!(user_id = token.user_id, error = %e, "Watch channel renewal failed");
                false
            }
        };

        let sync = self.sync_inbound_with(&token).await;
        let push = self.push_pending_with(&token).await?;

        Ok(CalendarOutcome {
            renewed,
            synced: sync.success,
            pushed: push.synced,
            push_errors: push.errors,
        })
    }
}
