//! Inbound and outbound event synchronization.
//!
//! Inbound sync uses the provider's sync token to fetch only what changed
//! since the last run; a rejected token falls back to a full listing that
//! also reconciles local rows the provider no longer has. Outbound sync
//! pushes locally pending rows, guarding updates with the stored etag.

use std::sync::Arc;

use chrono::Utc;
use litis_core::calendar_state::{token_needs_refresh, ConnectionEvent};
use litis_core::types::DbId;
use litis_db::models::calendar::{CalendarToken, RemoteChange};
use litis_db::repositories::{CalendarEventRepo, CalendarTokenRepo};
use litis_db::DbPool;
use serde::Serialize;

use crate::error::{CalendarError, ProviderError};
use crate::provider::{CalendarProvider, EventDraft};

/// Upper bound on pages fetched in one inbound sync.
const MAX_PAGES: usize = 100;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Result of one inbound sync.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub success: bool,
    /// Whether a full listing was used instead of an incremental one.
    pub full_sync: bool,
    pub events_added: u32,
    pub events_updated: u32,
    pub events_deleted: u32,
    #[serde(skip_serializing)]
    pub new_sync_token: Option<String>,
    pub error: Option<String>,
}

impl SyncReport {
    fn failed(full_sync: bool, error: impl ToString) -> Self {
        Self {
            success: false,
            full_sync,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Result of pushing local pending events to the provider.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PushReport {
    pub synced: u32,
    /// Events that could not be pushed; they stay pending.
    pub errors: u32,
    /// Set when the push could not start at all.
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Calendar synchronization engine.
///
/// Holds the pool and the provider; all state lives in the database.
#[derive(Clone)]
pub struct CalendarSyncEngine {
    pub(crate) pool: DbPool,
    pub(crate) provider: Arc<dyn CalendarProvider>,
}

impl CalendarSyncEngine {
    pub fn new(pool: DbPool, provider: Arc<dyn CalendarProvider>) -> Self {
        Self { pool, provider }
    }

    pub(crate) async fn load_token(
        &self,
        user_id: DbId,
        calendar_id: &str,
    ) -> Result<CalendarToken, CalendarError> {
        CalendarTokenRepo::find(&self.pool, user_id, calendar_id)
            .await?
            .ok_or_else(|| CalendarError::NotConnected {
                user_id,
                calendar_id: calendar_id.to_string(),
            })
    }

    /// Return a usable access token, refreshing it first if it is about to
    /// expire. The refreshed credentials are persisted.
    pub async fn ensure_fresh_token(
        &self,
        token: &CalendarToken,
    ) -> Result<String, CalendarError> {
        if !token_needs_refresh(token.expires_at, Utc::now()) {
            return Ok(token.access_token.clone());
        }
        let Some(refresh_token) = token.refresh_token.as_deref() else {
            return Err(ProviderError::Unauthorized(
                "access token expired and no refresh token is stored".into(),
            )
            .into());
        };

        let fresh = self.provider.refresh_access_token(refresh_token).await?;
        CalendarTokenRepo::update_access_token(
            &self.pool,
            token.id,
            &fresh.access_token,
            fresh.refresh_token.as_deref(),
            fresh.expires_at,
        )
        .await?;

        tracing::debug!(user_id = token.user_id, calendar_id = %token.calendar_id, "Refreshed calendar access token");
        Ok(fresh.access_token)
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Pull remote changes into the local mirror.
    ///
    /// Provider failures are reported in the returned [`SyncReport`] and
    /// recorded on the connection (state `sync_error`); the stored sync
    /// token is left untouched so the next run retries the same delta.
    pub async fn sync_inbound(
        &self,
        user_id: DbId,
        calendar_id: &str,
    ) -> Result<SyncReport, CalendarError> {
        let token = self.load_token(user_id, calendar_id).await?;
        Ok(self.sync_inbound_with(&token).await)
    }

    pub(crate) async fn sync_inbound_with(&self, token: &CalendarToken) -> SyncReport {
        match self.try_sync_inbound(token).await {
            Ok(report) => {
                log_transition(token, ConnectionEvent::SyncSucceeded);
                tracing::info!(
                    user_id = token.user_id,
                    calendar_id = %token.calendar_id,
                    full_sync = report.full_sync,
                    added = report.events_added,
                    updated = report.events_updated,
                    deleted = report.events_deleted,
                    "Inbound calendar sync complete"
                );
                report
            }
            Err((full_sync, e)) => {
                tracing::warn!(
                    user_id = token.user_id,
                    calendar_id = %token.calendar_id,
                    error = %e,
                    "Inbound calendar sync failed"
                );
                log_transition(token, ConnectionEvent::SyncFailed);
                if let Err(db_err) =
                    CalendarTokenRepo::record_sync_failure(&self.pool, token.id, &e.to_string()).await
                {
                    tracing::error!(token_id = token.id, error = %db_err, "Failed to record sync failure");
                }
                SyncReport::failed(full_sync, e)
            }
        }
    }

    async fn try_sync_inbound(
        &self,
        token: &CalendarToken,
    ) -> Result<SyncReport, (bool, CalendarError)> {
        let access_token = self
            .ensure_fresh_token(token)
            .await
            .map_err(|e| (false, e))?;

        let (changes, next_sync_token, full_sync) = match token.sync_token.as_deref() {
            Some(sync_token) => {
                match self
                    .collect_changes(&access_token, &token.calendar_id, Some(sync_token))
                    .await
                {
                    Ok((changes, next)) => (changes, next, false),
                    Err(ProviderError::Gone) => {
                        tracing::info!(
                            user_id = token.user_id,
                            calendar_id = %token.calendar_id,
                            "Sync token rejected, falling back to full sync"
                        );
                        let (changes, next) = self
                            .collect_changes(&access_token, &token.calendar_id, None)
                            .await
                            .map_err(|e| (true, e.into()))?;
                        (changes, next, true)
                    }
                    Err(e) => return Err((false, e.into())),
                }
            }
            None => {
                let (changes, next) = self
                    .collect_changes(&access_token, &token.calendar_id, None)
                    .await
                    .map_err(|e| (true, e.into()))?;
                (changes, next, true)
            }
        };

        let applied = CalendarEventRepo::apply_remote_changes(
            &self.pool,
            token.id,
            token.user_id,
            &token.calendar_id,
            &changes,
            full_sync,
            next_sync_token.as_deref(),
        )
        .await
        .map_err(|e| (full_sync, e.into()))?;

        Ok(SyncReport {
            success: true,
            full_sync,
            events_added: applied.added,
            events_updated: applied.updated,
            events_deleted: applied.deleted,
            new_sync_token: next_sync_token,
            error: None,
        })
    }

    /// Fetch every page of a listing. Returns the changes and the sync
    /// token from the last page.
    async fn collect_changes(
        &self,
        access_token: &str,
        calendar_id: &str,
        sync_token: Option<&str>,
    ) -> Result<(Vec<RemoteChange>, Option<String>), ProviderError> {
        let mut changes = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self
                .provider
                .list_events(access_token, calendar_id, sync_token, page_token.as_deref())
                .await?;
            changes.extend(page.changes);

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => return Ok((changes, page.next_sync_token)),
            }
        }

        Err(ProviderError::InvalidResponse(format!(
            "event listing exceeded {MAX_PAGES} pages"
        )))
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Push locally pending events (creations, edits, deletions).
    ///
    /// Each event is pushed independently; a failed event stays pending and
    /// is counted in [`PushReport::errors`].
    pub async fn push_pending(
        &self,
        user_id: DbId,
        calendar_id: &str,
    ) -> Result<PushReport, CalendarError> {
        let token = self.load_token(user_id, calendar_id).await?;
        self.push_pending_with(&token).await
    }

    pub(crate) async fn push_pending_with(
        &self,
        token: &CalendarToken,
    ) -> Result<PushReport, CalendarError> {
        let pending =
            CalendarEventRepo::list_pending(&self.pool, token.user_id, &token.calendar_id).await?;
        if pending.is_empty() {
            return Ok(PushReport::default());
        }

        let access_token = match self.ensure_fresh_token(token).await {
            Ok(t) => t,
            Err(e) => {
                return Ok(PushReport {
                    synced: 0,
                    errors: pending.len() as u32,
                    error: Some(e.to_string()),
                })
            }
        };

        let mut report = PushReport::default();
        for event in &pending {
            let calendar_id = token.calendar_id.as_str();
            let result = match (event.is_deleted(), event.external_id.as_deref()) {
                // Never reached the provider; nothing to delete remotely.
                (true, None) => Ok((None, None)),
                (true, Some(external_id)) => {
                    match self
                        .provider
                        .delete_event(&access_token, calendar_id, external_id)
                        .await
                    {
                        Ok(()) | Err(ProviderError::NotFound) => Ok((None, None)),
                        Err(e) => Err(e),
                    }
                }
                (false, None) => self
                    .provider
                    .insert_event(&access_token, calendar_id, &EventDraft::from(event))
                    .await
                    .map(|r| (Some(r.external_id), r.etag)),
                (false, Some(external_id)) => self
                    .provider
                    .update_event(
                        &access_token,
                        calendar_id,
                        external_id,
                        event.etag.as_deref(),
                        &EventDraft::from(event),
                    )
                    .await
                    .map(|r| (Some(r.external_id), r.etag)),
            };

            // A failed bookkeeping write counts against this event only; it
            // stays pending and is pushed again next pass.
            let pushed = match result {
                Ok((external_id, etag)) => CalendarEventRepo::mark_pushed(
                    &self.pool,
                    event.id,
                    external_id.as_deref(),
                    etag.as_deref(),
                )
                .await
                .map_err(CalendarError::from),
                Err(e) => Err(CalendarError::from(e)),
            };

            match pushed {
                Ok(()) => report.synced += 1,
                Err(e) => {
                    tracing::warn!(
                        event_id = event.id,
                        user_id = token.user_id,
                        error = %e,
                        "Failed to push calendar event"
                    );
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            user_id = token.user_id,
            calendar_id = %token.calendar_id,
            synced = report.synced,
            errors = report.errors,
            "Outbound calendar push complete"
        );
        Ok(report)
    }
}

fn log_transition(token: &CalendarToken, event: ConnectionEvent) {
    let from = token.state();
    match from.apply(event) {
        Ok(to) if to != from => {
            tracing::debug!(user_id = token.user_id, calendar_id = %token.calendar_id, %from, %to, "Calendar connection state changed");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(user_id = token.user_id, error = %e, "Invalid calendar state transition"),
    }
}
