//! Connecting and disconnecting a user's external calendar.

use litis_core::calendar_state::{ConnectionEvent, ConnectionState};
use litis_core::types::{DbId, Timestamp};
use litis_db::repositories::{CalendarTokenRepo, WatchChannelRepo};
use serde::Serialize;

use crate::error::CalendarError;
use crate::sync::{CalendarSyncEngine, SyncReport};

/// Result of connecting a calendar.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectReport {
    pub calendar_id: String,
    pub state: ConnectionState,
    pub watch_channel_created: bool,
    pub initial_sync: SyncReport,
}

/// Public view of one connected calendar.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub calendar_id: String,
    pub state: ConnectionState,
    pub last_sync_at: Option<Timestamp>,
    pub last_sync_error: Option<String>,
    pub watch_channel_active: bool,
    pub watch_channel_expiration: Option<Timestamp>,
}

impl CalendarSyncEngine {
    /// Exchange an OAuth code and connect `calendar_id`.
    ///
    /// The connection is stored in `initial_sync_pending`, a watch channel is
    /// registered, and a full sync runs. Channel or sync failures do not undo
    /// the connection; maintenance retries them.
    pub async fn connect(
        &self,
        user_id: DbId,
        calendar_id: &str,
        code: &str,
    ) -> Result<ConnectReport, CalendarError> {
        let tokens = self.provider.exchange_code(code).await?;
        let token = CalendarTokenRepo::upsert_connection(
            &self.pool,
            user_id,
            calendar_id,
            &tokens.access_token,
            tokens.refresh_token.as_deref(),
            tokens.expires_at,
        )
        .await?;
        let state = ConnectionState::Disconnected.apply(ConnectionEvent::Connect)?;
        tracing::info!(user_id, calendar_id, %state, "Calendar connected");

        let watch_channel_created = match self.create_watch_channel(&token).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(user_id, calendar_id, error = %e, "Watch channel creation failed on connect");
                false
            }
        };

        let initial_sync = self.sync_inbound_with(&token).await;
        let state = state.apply(if initial_sync.success {
            ConnectionEvent::SyncSucceeded
        } else {
            ConnectionEvent::SyncFailed
        })?;

        Ok(ConnectReport {
            calendar_id: calendar_id.to_string(),
            state,
            watch_channel_created,
            initial_sync,
        })
    }

    /// Stop every channel of the calendar remotely, then delete its channels
    /// and credentials locally. Returns `false` if it was not connected.
    pub async fn disconnect(&self, user_id: DbId, calendar_id: &str) -> Result<bool, CalendarError> {
        let Some(token) = CalendarTokenRepo::find(&self.pool, user_id, calendar_id).await? else {
            return Ok(false);
        };

        for channel in WatchChannelRepo::list_active_for(&self.pool, user_id, calendar_id).await? {
            self.stop_watch_channel(&token, &channel).await?;
        }

        let channels = WatchChannelRepo::delete_for(&self.pool, user_id, calendar_id).await?;
        let deleted = CalendarTokenRepo::delete(&self.pool, user_id, calendar_id).await?;
        tracing::info!(user_id, calendar_id, channels, "Calendar disconnected");
        Ok(deleted)
    }

    /// Status of every calendar the user has connected.
    pub async fn status(&self, user_id: DbId) -> Result<Vec<ConnectionStatus>, CalendarError> {
        let tokens = CalendarTokenRepo::list_for_user(&self.pool, user_id).await?;
        let mut statuses = Vec::with_capacity(tokens.len());
        for token in tokens {
            let live =
                WatchChannelRepo::list_active_for(&self.pool, user_id, &token.calendar_id).await?;
            let channel = live.iter().find(|c| c.is_active());
            statuses.push(ConnectionStatus {
                state: token.state(),
                watch_channel_active: channel.is_some(),
                watch_channel_expiration: channel.and_then(|c| c.expiration),
                calendar_id: token.calendar_id,
                last_sync_at: token.last_sync_at,
                last_sync_error: token.last_sync_error,
            });
        }
        Ok(statuses)
    }
}
