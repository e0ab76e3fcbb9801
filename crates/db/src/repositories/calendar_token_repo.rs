//! Repository for the `calendar_tokens` table.
//!
//! A row exists exactly while a calendar is connected; `sync_state` holds
//! the connected sub-state.

use litis_core::calendar_state::ConnectionState;
use litis_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::calendar::CalendarToken;

const COLUMNS: &str = "id, user_id, calendar_id, access_token, refresh_token, expires_at, \
                       sync_token, sync_state, last_sync_at, last_sync_error, created_at, updated_at";

pub struct CalendarTokenRepo;

impl CalendarTokenRepo {
    /// Store credentials for a (re)connected calendar.
    ///
    /// Reconnecting resets the sync token and puts the calendar back into
    /// `initial_sync_pending`. A missing refresh token keeps the stored one,
    /// since providers only issue it on first consent.
    pub async fn upsert_connection(
        pool: &PgPool,
        user_id: DbId,
        calendar_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<Timestamp>,
    ) -> Result<CalendarToken, sqlx::Error> {
        let query = format!(
            "INSERT INTO calendar_tokens \
                (user_id, calendar_id, access_token, refresh_token, expires_at, sync_state) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT ON CONSTRAINT uq_calendar_tokens_user_calendar DO UPDATE SET \
                access_token = EXCLUDED.access_token, \
                refresh_token = COALESCE(EXCLUDED.refresh_token, calendar_tokens.refresh_token), \
                expires_at = EXCLUDED.expires_at, \
                sync_token = NULL, \
                sync_state = EXCLUDED.sync_state, \
                last_sync_error = NULL, \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CalendarToken>(&query)
            .bind(user_id)
            .bind(calendar_id)
            .bind(access_token)
            .bind(refresh_token)
            .bind(expires_at)
            .bind(ConnectionState::InitialSyncPending.as_str())
            .fetch_one(pool)
            .await
    }

    pub async fn find(
        pool: &PgPool,
        user_id: DbId,
        calendar_id: &str,
    ) -> Result<Option<CalendarToken>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calendar_tokens WHERE user_id = $1 AND calendar_id = $2"
        );
        sqlx::query_as::<_, CalendarToken>(&query)
            .bind(user_id)
            .bind(calendar_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<CalendarToken>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calendar_tokens WHERE user_id = $1 ORDER BY calendar_id"
        );
        sqlx::query_as::<_, CalendarToken>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Every connected calendar; the maintenance job's work list.
    pub async fn list_connected(pool: &PgPool) -> Result<Vec<CalendarToken>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM calendar_tokens ORDER BY user_id, calendar_id");
        sqlx::query_as::<_, CalendarToken>(&query).fetch_all(pool).await
    }

    /// Credentials of any connected calendar that has an active watch
    /// channel on `resource_id`.
    pub async fn find_by_active_resource(
        pool: &PgPool,
        resource_id: &str,
    ) -> Result<Option<CalendarToken>, sqlx::Error> {
        let columns = COLUMNS
            .split(", ")
            .map(|c| format!("t.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "SELECT {columns} FROM calendar_tokens t \
             JOIN calendar_watch_channels c \
               ON c.user_id = t.user_id AND c.calendar_id = t.calendar_id \
             WHERE c.resource_id = $1 AND c.status = 'active' \
             ORDER BY c.created_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, CalendarToken>(&query)
            .bind(resource_id)
            .fetch_optional(pool)
            .await
    }

    /// Store a refreshed access token.
    pub async fn update_access_token(
        pool: &PgPool,
        id: DbId,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<Timestamp>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE calendar_tokens SET \
                access_token = $2, \
                refresh_token = COALESCE($3, refresh_token), \
                expires_at = $4, \
                updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Move the calendar to `sync_error`, keeping the sync token.
    pub async fn record_sync_failure(
        pool: &PgPool,
        id: DbId,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE calendar_tokens SET sync_state = $2, last_sync_error = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(ConnectionState::SyncError.as_str())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove the credentials. Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, user_id: DbId, calendar_id: &str) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM calendar_tokens WHERE user_id = $1 AND calendar_id = $2")
                .bind(user_id)
                .bind(calendar_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
