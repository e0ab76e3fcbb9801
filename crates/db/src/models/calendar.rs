//! External calendar credentials, watch channels, and mirrored events.

use litis_core::calendar_state::{ConnectionState, EventSyncStatus, WatchChannelStatus};
use litis_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Calendar used when the caller does not name one.
pub const DEFAULT_CALENDAR_ID: &str = "primary";

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// A row from the `calendar_tokens` table.
///
/// Not `Serialize`: it carries live OAuth credentials.
#[derive(Debug, Clone, FromRow)]
pub struct CalendarToken {
    pub id: DbId,
    pub user_id: DbId,
    pub calendar_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<Timestamp>,
    pub sync_token: Option<String>,
    pub sync_state: String,
    pub last_sync_at: Option<Timestamp>,
    pub last_sync_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CalendarToken {
    /// Connection state of this calendar. An unknown stored value is
    /// reported as `SyncError` so it gets resynced.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_str(&self.sync_state).unwrap_or(ConnectionState::SyncError)
    }
}

// ---------------------------------------------------------------------------
// Watch channels
// ---------------------------------------------------------------------------

/// A row from the `calendar_watch_channels` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WatchChannel {
    pub id: DbId,
    pub user_id: DbId,
    pub calendar_id: String,
    pub channel_id: String,
    #[serde(skip_serializing)]
    pub verification_token: String,
    pub resource_id: Option<String>,
    pub expiration: Option<Timestamp>,
    pub status: String,
    pub notification_count: i64,
    pub last_notification_at: Option<Timestamp>,
    pub last_message_number: Option<i64>,
    pub stopped_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WatchChannel {
    pub fn is_active(&self) -> bool {
        WatchChannelStatus::from_str(&self.status) == Some(WatchChannelStatus::Active)
    }

    /// Active, or registered but not yet confirmed by the provider.
    pub fn is_live(&self) -> bool {
        matches!(
            WatchChannelStatus::from_str(&self.status),
            Some(WatchChannelStatus::Active | WatchChannelStatus::Pending)
        )
    }
}

/// A channel about to be registered with the provider.
#[derive(Debug, Clone)]
pub struct NewWatchChannel {
    pub user_id: DbId,
    pub calendar_id: String,
    pub channel_id: String,
    pub verification_token: String,
    pub resource_id: Option<String>,
    pub expiration: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A row from the `calendar_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CalendarEvent {
    pub id: DbId,
    pub user_id: DbId,
    pub calendar_id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub all_day: bool,
    pub external_id: Option<String>,
    pub etag: Option<String>,
    pub sync_status: String,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CalendarEvent {
    pub fn sync_status(&self) -> Option<EventSyncStatus> {
        EventSyncStatus::from_str(&self.sync_status)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// DTO for creating a local event (pushed outbound on the next sync).
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCalendarEvent {
    pub calendar_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub all_day: Option<bool>,
}

/// Event data received from the provider, already validated and typed.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEventData {
    pub external_id: String,
    pub etag: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub all_day: bool,
}

/// One item of an inbound sync delta.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    /// Created or updated remotely.
    Upsert(RemoteEventData),
    /// Cancelled/deleted remotely.
    Deleted { external_id: String },
    /// Exists remotely but lacks the data needed to store it. The local
    /// mirror is left as is.
    Unreadable { external_id: String },
}

impl RemoteChange {
    pub fn external_id(&self) -> &str {
        match self {
            Self::Upsert(data) => &data.external_id,
            Self::Deleted { external_id } | Self::Unreadable { external_id } => external_id,
        }
    }
}

/// Counts produced by applying an inbound delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppliedChanges {
    pub added: u32,
    pub updated: u32,
    pub deleted: u32,
    pub unchanged: u32,
}
