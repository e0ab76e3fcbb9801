//! Repository for the append-only `notification_log` table.

use litis_core::types::DbId;
use sqlx::PgPool;

use crate::models::notification_log::{NewNotificationLog, NotificationLogEntry};

const COLUMNS: &str = "id, alert_id, user_id, channel, status, provider_message_id, attempts, \
                       error, context, created_at";

pub struct NotificationLogRepo;

impl NotificationLogRepo {
    pub async fn append(pool: &PgPool, entry: &NewNotificationLog) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO notification_log \
                (alert_id, user_id, channel, status, provider_message_id, attempts, error, context) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id",
        )
        .bind(entry.alert_id)
        .bind(entry.user_id)
        .bind(entry.channel)
        .bind(entry.status)
        .bind(&entry.provider_message_id)
        .bind(entry.attempts)
        .bind(&entry.error)
        .bind(&entry.context)
        .fetch_one(pool)
        .await
    }

    /// All log rows for an alert, oldest first.
    pub async fn list_for_alert(
        pool: &PgPool,
        alert_id: DbId,
    ) -> Result<Vec<NotificationLogEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_log WHERE alert_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, NotificationLogEntry>(&query)
            .bind(alert_id)
            .fetch_all(pool)
            .await
    }
}
