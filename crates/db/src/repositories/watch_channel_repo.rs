//! Repository for the `calendar_watch_channels` table.

use litis_core::calendar_state::WatchChannelStatus;
use litis_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::calendar::{NewWatchChannel, WatchChannel};

const COLUMNS: &str = "id, user_id, calendar_id, channel_id, verification_token, resource_id, \
                       expiration, status, notification_count, last_notification_at, \
                       last_message_number, stopped_at, created_at, updated_at";

pub struct WatchChannelRepo;

impl WatchChannelRepo {
    /// Record a channel as pending, before it is registered with the
    /// provider, so notifications racing the registration find it.
    ///
    /// Callers must have stopped any previous live channel for the same
    /// (user, calendar) first.
    pub async fn create_pending(
        pool: &PgPool,
        input: &NewWatchChannel,
    ) -> Result<WatchChannel, sqlx::Error> {
        let query = format!(
            "INSERT INTO calendar_watch_channels \
                (user_id, calendar_id, channel_id, verification_token, resource_id, expiration, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WatchChannel>(&query)
            .bind(input.user_id)
            .bind(&input.calendar_id)
            .bind(&input.channel_id)
            .bind(&input.verification_token)
            .bind(&input.resource_id)
            .bind(input.expiration)
            .bind(WatchChannelStatus::Pending.as_str())
            .fetch_one(pool)
            .await
    }

    /// Mark a pending channel active with the provider's registration
    /// details. Returns `None` if the channel was stopped meanwhile.
    pub async fn activate(
        pool: &PgPool,
        id: DbId,
        resource_id: Option<&str>,
        expiration: Option<Timestamp>,
    ) -> Result<Option<WatchChannel>, sqlx::Error> {
        let query = format!(
            "UPDATE calendar_watch_channels \
             SET status = $2, resource_id = $3, expiration = $4, updated_at = NOW() \
             WHERE id = $1 AND status = $5 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WatchChannel>(&query)
            .bind(id)
            .bind(WatchChannelStatus::Active.as_str())
            .bind(resource_id)
            .bind(expiration)
            .bind(WatchChannelStatus::Pending.as_str())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_channel_id(
        pool: &PgPool,
        channel_id: &str,
    ) -> Result<Option<WatchChannel>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM calendar_watch_channels WHERE channel_id = $1");
        sqlx::query_as::<_, WatchChannel>(&query)
            .bind(channel_id)
            .fetch_optional(pool)
            .await
    }

    /// Channels of a (user, calendar) that are not stopped, pending
    /// registrations included.
    pub async fn list_active_for(
        pool: &PgPool,
        user_id: DbId,
        calendar_id: &str,
    ) -> Result<Vec<WatchChannel>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calendar_watch_channels \
             WHERE user_id = $1 AND calendar_id = $2 AND status <> $3 \
             ORDER BY id"
        );
        sqlx::query_as::<_, WatchChannel>(&query)
            .bind(user_id)
            .bind(calendar_id)
            .bind(WatchChannelStatus::Stopped.as_str())
            .fetch_all(pool)
            .await
    }

    /// Every channel row for a (user, calendar), any status.
    pub async fn list_for(
        pool: &PgPool,
        user_id: DbId,
        calendar_id: &str,
    ) -> Result<Vec<WatchChannel>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calendar_watch_channels \
             WHERE user_id = $1 AND calendar_id = $2 \
             ORDER BY id"
        );
        sqlx::query_as::<_, WatchChannel>(&query)
            .bind(user_id)
            .bind(calendar_id)
            .fetch_all(pool)
            .await
    }

    /// Mark a channel stopped. Returns `false` if it was already stopped.
    pub async fn mark_stopped(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE calendar_watch_channels \
             SET status = $2, stopped_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status <> $2",
        )
        .bind(id)
        .bind(WatchChannelStatus::Stopped.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count a push notification on a channel.
    ///
    /// When `message_number` is given and is not newer than the last one
    /// recorded, nothing is updated and `false` is returned: the
    /// notification is a redelivery.
    pub async fn record_notification(
        pool: &PgPool,
        id: DbId,
        message_number: Option<i64>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE calendar_watch_channels SET \
                notification_count = notification_count + 1, \
                last_notification_at = NOW(), \
                last_message_number = COALESCE($2, last_message_number), \
                updated_at = NOW() \
             WHERE id = $1 \
               AND ($2::BIGINT IS NULL OR last_message_number IS NULL OR last_message_number < $2)",
        )
        .bind(id)
        .bind(message_number)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Active channels expiring before `before`, or with no known expiration.
    pub async fn list_expiring(
        pool: &PgPool,
        before: Timestamp,
    ) -> Result<Vec<WatchChannel>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calendar_watch_channels \
             WHERE status = $1 AND (expiration IS NULL OR expiration < $2) \
             ORDER BY id"
        );
        sqlx::query_as::<_, WatchChannel>(&query)
            .bind(WatchChannelStatus::Active.as_str())
            .bind(before)
            .fetch_all(pool)
            .await
    }

    /// Delete every channel row of a (user, calendar). Returns rows removed.
    pub async fn delete_for(
        pool: &PgPool,
        user_id: DbId,
        calendar_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM calendar_watch_channels WHERE user_id = $1 AND calendar_id = $2",
        )
        .bind(user_id)
        .bind(calendar_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
