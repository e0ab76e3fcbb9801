//! External-calendar connection state machine and sync status values.
//!
//! ```text
//! disconnected --connect--> initial_sync_pending --sync ok--> synced
//!                                  |                            |  ^
//!                               sync failed                sync failed | sync ok
//!                                  v                            v  |
//!                               sync_error <-------------------- sync_error
//! any connected state --disconnect--> disconnected
//! any connected state --connect-----> initial_sync_pending (reconnect)
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Connection state of one user's external calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    InitialSyncPending,
    Synced,
    SyncError,
}

/// Something that happened to a calendar connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connect,
    SyncSucceeded,
    SyncFailed,
    Disconnect,
}

impl ConnectionState {
    /// State name as stored in `calendar_tokens.sync_state`.
    ///
    /// `Disconnected` has no row, so it is never persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::InitialSyncPending => "initial_sync_pending",
            Self::Synced => "synced",
            Self::SyncError => "sync_error",
        }
    }

    /// Parse a stored state. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "disconnected" => Some(Self::Disconnected),
            "initial_sync_pending" => Some(Self::InitialSyncPending),
            "synced" => Some(Self::Synced),
            "sync_error" => Some(Self::SyncError),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Apply `event`, returning the next state.
    ///
    /// Sync results are only meaningful for a connected calendar; reporting
    /// one for a disconnected calendar is a validation error. Disconnecting
    /// an already disconnected calendar is a no-op.
    pub fn apply(self, event: ConnectionEvent) -> Result<Self, CoreError> {
        use ConnectionEvent as E;
        match (self, event) {
            (_, E::Connect) => Ok(Self::InitialSyncPending),
            (_, E::Disconnect) => Ok(Self::Disconnected),
            (Self::Disconnected, E::SyncSucceeded | E::SyncFailed) => Err(CoreError::Validation(
                "Cannot record a sync result for a disconnected calendar".into(),
            )),
            (_, E::SyncSucceeded) => Ok(Self::Synced),
            (_, E::SyncFailed) => Ok(Self::SyncError),
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event sync status
// ---------------------------------------------------------------------------

/// Outbound sync status of a local calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSyncStatus {
    /// Local change not yet pushed to the provider.
    Pending,
    /// Local row mirrors the provider.
    Synced,
}

impl EventSyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "synced" => Some(Self::Synced),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Watch channels
// ---------------------------------------------------------------------------

/// Status of a push-notification watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchChannelStatus {
    /// Recorded locally, registration with the provider not yet confirmed.
    Pending,
    Active,
    Stopped,
}

impl WatchChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Stopped => "stopped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }
}

/// Channels expiring within this window are renewed by maintenance.
pub const CHANNEL_RENEWAL_WINDOW_HOURS: i64 = 24;

/// Access tokens expiring within this window are refreshed before use.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Whether a watch channel expiring at `expiration` must be renewed at `now`.
///
/// A channel without a known expiration is treated as needing renewal.
pub fn channel_needs_renewal(expiration: Option<Timestamp>, now: Timestamp) -> bool {
    match expiration {
        Some(exp) => exp - now <= Duration::hours(CHANNEL_RENEWAL_WINDOW_HOURS),
        None => true,
    }
}

/// Whether an access token expiring at `expires_at` must be refreshed at `now`.
pub fn token_needs_refresh(expires_at: Option<Timestamp>, now: Timestamp) -> bool {
    match expires_at {
        Some(exp) => exp - now <= Duration::seconds(TOKEN_REFRESH_MARGIN_SECS),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    use ConnectionEvent as E;
    use ConnectionState as S;

    #[test]
    fn happy_path_reaches_synced() {
        let s = S::Disconnected.apply(E::Connect).unwrap();
        assert_eq!(s, S::InitialSyncPending);
        let s = s.apply(E::SyncSucceeded).unwrap();
        assert_eq!(s, S::Synced);
        assert_eq!(s.apply(E::SyncSucceeded).unwrap(), S::Synced);
    }

    #[test]
    fn failure_and_recovery() {
        let s = S::Synced.apply(E::SyncFailed).unwrap();
        assert_eq!(s, S::SyncError);
        assert_eq!(s.apply(E::SyncFailed).unwrap(), S::SyncError);
        assert_eq!(s.apply(E::SyncSucceeded).unwrap(), S::Synced);
        assert_eq!(S::InitialSyncPending.apply(E::SyncFailed).unwrap(), S::SyncError);
    }

    #[test]
    fn disconnect_from_anywhere() {
        for s in [S::InitialSyncPending, S::Synced, S::SyncError, S::Disconnected] {
            assert_eq!(s.apply(E::Disconnect).unwrap(), S::Disconnected);
        }
    }

    #[test]
    fn sync_result_on_disconnected_is_invalid() {
        assert_matches!(S::Disconnected.apply(E::SyncSucceeded), Err(CoreError::Validation(_)));
        assert_matches!(S::Disconnected.apply(E::SyncFailed), Err(CoreError::Validation(_)));
    }

    #[test]
    fn reconnect_restarts_initial_sync() {
        assert_eq!(S::SyncError.apply(E::Connect).unwrap(), S::InitialSyncPending);
    }

    #[test]
    fn states_round_trip_through_strings() {
        for s in [S::Disconnected, S::InitialSyncPending, S::Synced, S::SyncError] {
            assert_eq!(S::from_str(s.as_str()), Some(s));
        }
        assert_eq!(S::from_str("bogus"), None);
    }

    #[test]
    fn renewal_window() {
        let now = Utc::now();
        assert!(channel_needs_renewal(None, now));
        assert!(channel_needs_renewal(Some(now + Duration::hours(2)), now));
        assert!(!channel_needs_renewal(Some(now + Duration::days(5)), now));
    }

    #[test]
    fn refresh_margin() {
        let now = Utc::now();
        assert!(token_needs_refresh(Some(now + Duration::seconds(30)), now));
        assert!(token_needs_refresh(Some(now - Duration::seconds(30)), now));
        assert!(!token_needs_refresh(Some(now + Duration::minutes(30)), now));
        assert!(!token_needs_refresh(None, now));
    }
}
