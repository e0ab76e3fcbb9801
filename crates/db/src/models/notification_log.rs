//! Append-only notification delivery log.

use litis_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notification_log` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationLogEntry {
    pub id: DbId,
    pub alert_id: Option<DbId>,
    pub user_id: DbId,
    pub channel: String,
    pub status: String,
    pub provider_message_id: Option<String>,
    pub attempts: i32,
    pub error: Option<String>,
    pub context: serde_json::Value,
    pub created_at: Timestamp,
}

/// A log record to append.
#[derive(Debug, Clone)]
pub struct NewNotificationLog {
    pub alert_id: Option<DbId>,
    pub user_id: DbId,
    pub channel: &'static str,
    pub status: &'static str,
    pub provider_message_id: Option<String>,
    pub attempts: i32,
    pub error: Option<String>,
    pub context: serde_json::Value,
}
