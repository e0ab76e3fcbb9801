//! Push notification handling.
//!
//! Notifications carry no payload, only channel identity headers. A valid
//! notification triggers one incremental sync of the channel's calendar.
//! Every outcome, including unknown channels, is acknowledged by the
//! caller with a 2xx.

use litis_db::repositories::{CalendarTokenRepo, WatchChannelRepo};
use serde::Serialize;

use crate::error::CalendarError;
use crate::sync::{CalendarSyncEngine, SyncReport};

pub const HEADER_CHANNEL_ID: &str = "x-goog-channel-id";
pub const HEADER_CHANNEL_TOKEN: &str = "x-goog-channel-token";
pub const HEADER_RESOURCE_ID: &str = "x-goog-resource-id";
pub const HEADER_RESOURCE_STATE: &str = "x-goog-resource-state";
pub const HEADER_MESSAGE_NUMBER: &str = "x-goog-message-number";

/// Resource state of the handshake sent right after a channel is created.
const HANDSHAKE_STATE: &str = "sync";

/// Identity headers of one push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotification {
    pub channel_id: String,
    pub channel_token: Option<String>,
    pub resource_id: Option<String>,
    pub resource_state: Option<String>,
    pub message_number: Option<i64>,
}

impl WebhookNotification {
    /// Read a notification from request headers. `get` looks up a header by
    /// lowercase name. Returns `None` without a channel id.
    pub fn from_headers<'a>(get: impl Fn(&str) -> Option<&'a str>) -> Option<Self> {
        let owned = |name: &str| {
            get(name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Some(Self {
            channel_id: owned(HEADER_CHANNEL_ID)?,
            channel_token: owned(HEADER_CHANNEL_TOKEN),
            resource_id: owned(HEADER_RESOURCE_ID),
            resource_state: owned(HEADER_RESOURCE_STATE),
            message_number: owned(HEADER_MESSAGE_NUMBER).and_then(|n| n.parse().ok()),
        })
    }

    pub fn is_handshake(&self) -> bool {
        self.resource_state.as_deref() == Some(HANDSHAKE_STATE)
    }
}

/// What the webhook did with a notification.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Synced(SyncReport),
    HandshakeIgnored,
    /// Unknown or stopped channel. `stopped` reports whether a remote stop
    /// succeeded.
    Orphaned { stopped: bool },
    TokenMismatch,
    /// Message number already seen on this channel.
    Duplicate,
    SyncFailed { error: String },
}

impl CalendarSyncEngine {
    /// Process one push notification.
    ///
    /// Errors are only returned for database failures; the caller still
    /// acknowledges the provider.
    pub async fn handle_webhook(
        &self,
        notification: &WebhookNotification,
    ) -> Result<WebhookOutcome, CalendarError> {
        // May arrive before the channel row is visible; never an orphan.
        if notification.is_handshake() {
            tracing::debug!(channel_id = %notification.channel_id, "Webhook handshake acknowledged");
            return Ok(WebhookOutcome::HandshakeIgnored);
        }

        let channel = WatchChannelRepo::find_by_channel_id(&self.pool, &notification.channel_id)
            .await?
            .filter(|c| c.is_live());

        let Some(channel) = channel else {
            let stopped = self.stop_orphaned(notification).await;
            return Ok(WebhookOutcome::Orphaned { stopped });
        };

        if notification.channel_token.as_deref() != Some(channel.verification_token.as_str()) {
            tracing::warn!(channel_id = %channel.channel_id, "Webhook verification token mismatch");
            return Ok(WebhookOutcome::TokenMismatch);
        }

        if !WatchChannelRepo::record_notification(&self.pool, channel.id, notification.message_number)
            .await?
        {
            tracing::debug!(
                channel_id = %channel.channel_id,
                message_number = ?notification.message_number,
                "Duplicate webhook notification"
            );
            return Ok(WebhookOutcome::Duplicate);
        }

        let Some(token) =
            CalendarTokenRepo::find(&self.pool, channel.user_id, &channel.calendar_id).await?
        else {
            // Channel outlived its connection.
            WatchChannelRepo::mark_stopped(&self.pool, channel.id).await?;
            return Ok(WebhookOutcome::Orphaned { stopped: false });
        };

        let report = self.sync_inbound_with(&token).await;
        Ok(match report.error.clone() {
            Some(error) if !report.success => WebhookOutcome::SyncFailed { error },
            _ => WebhookOutcome::Synced(report),
        })
    }

    /// Best-effort remote stop of a channel nobody owns anymore, using the
    /// credentials of any connection actively watching the same resource.
    async fn stop_orphaned(&self, notification: &WebhookNotification) -> bool {
        let channel_id = notification.channel_id.as_str();
        let Some(resource_id) = notification.resource_id.as_deref() else {
            tracing::warn!(channel_id, "Orphaned webhook without resource id");
            return false;
        };

        let token = match CalendarTokenRepo::find_by_active_resource(&self.pool, resource_id).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::warn!(channel_id, resource_id, "Orphaned webhook, no credentials to stop it");
                return false;
            }
            Err(e) => {
                tracing::error!(channel_id, error = %e, "Credential lookup for orphaned channel failed");
                return false;
            }
        };

        let access_token = match self.ensure_fresh_token(&token).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(channel_id, error = %e, "Cannot refresh credentials for orphan stop");
                return false;
            }
        };

        match self
            .provider
            .stop_channel(&access_token, channel_id, resource_id)
            .await
        {
            Ok(()) => {
                tracing::info!(channel_id, resource_id, "Stopped orphaned watch channel");
                true
            }
            Err(e) => {
                tracing::warn!(channel_id, error = %e, "Failed to stop orphaned watch channel");
                false
            }
        }
    }
}
