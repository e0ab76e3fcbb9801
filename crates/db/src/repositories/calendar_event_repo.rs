//! Repository for the `calendar_events` table.
//!
//! Inbound deltas and the sync token they produced are written in a single
//! transaction by [`CalendarEventRepo::apply_remote_changes`]. Re-applying
//! the same delta is a no-op: upserts skip rows whose etag is unchanged and
//! deletions only touch rows not already deleted.

use litis_core::calendar_state::{ConnectionState, EventSyncStatus};
use litis_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::calendar::{
    AppliedChanges, CalendarEvent, CreateCalendarEvent, RemoteChange, RemoteEventData,
};

const COLUMNS: &str = "id, user_id, calendar_id, title, description, location, start_time, \
                       end_time, all_day, external_id, etag, sync_status, deleted_at, \
                       created_at, updated_at";

/// Outcome of upserting one remote event.
enum UpsertResult {
    Inserted,
    Updated,
    Unchanged,
}

pub struct CalendarEventRepo;

impl CalendarEventRepo {
    /// Create a local event awaiting outbound sync.
    pub async fn create_local(
        pool: &PgPool,
        user_id: DbId,
        calendar_id: &str,
        input: &CreateCalendarEvent,
    ) -> Result<CalendarEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO calendar_events \
                (user_id, calendar_id, title, description, location, start_time, end_time, \
                 all_day, sync_status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, false), $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CalendarEvent>(&query)
            .bind(user_id)
            .bind(calendar_id)
            .bind(input.title.trim())
            .bind(&input.description)
            .bind(&input.location)
            .bind(input.start_time)
            .bind(input.end_time)
            .bind(input.all_day)
            .bind(EventSyncStatus::Pending.as_str())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<CalendarEvent>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM calendar_events WHERE id = $1");
        sqlx::query_as::<_, CalendarEvent>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_external_id(
        pool: &PgPool,
        user_id: DbId,
        calendar_id: &str,
        external_id: &str,
    ) -> Result<Option<CalendarEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calendar_events \
             WHERE user_id = $1 AND calendar_id = $2 AND external_id = $3"
        );
        sqlx::query_as::<_, CalendarEvent>(&query)
            .bind(user_id)
            .bind(calendar_id)
            .bind(external_id)
            .fetch_optional(pool)
            .await
    }

    /// Non-deleted events of a user, ordered by start time.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<CalendarEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calendar_events \
             WHERE user_id = $1 AND deleted_at IS NULL \
             ORDER BY start_time, id"
        );
        sqlx::query_as::<_, CalendarEvent>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Soft-delete an event so the deletion can be pushed outbound.
    ///
    /// Returns `true` if a live event owned by `user_id` was deleted.
    pub async fn soft_delete(pool: &PgPool, id: DbId, user_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE calendar_events \
             SET deleted_at = NOW(), sync_status = $3, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(user_id)
        .bind(EventSyncStatus::Pending.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Events with local changes not yet pushed, deletions included.
    pub async fn list_pending(
        pool: &PgPool,
        user_id: DbId,
        calendar_id: &str,
    ) -> Result<Vec<CalendarEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calendar_events \
             WHERE user_id = $1 AND calendar_id = $2 AND sync_status = $3 \
             ORDER BY id"
        );
        sqlx::query_as::<_, CalendarEvent>(&query)
            .bind(user_id)
            .bind(calendar_id)
            .bind(EventSyncStatus::Pending.as_str())
            .fetch_all(pool)
            .await
    }

    /// Record a successful outbound push.
    ///
    /// `external_id` is `None` for a pushed deletion of an event that never
    /// reached the provider.
    pub async fn mark_pushed(
        pool: &PgPool,
        id: DbId,
        external_id: Option<&str>,
        etag: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE calendar_events SET \
                external_id = COALESCE($2, external_id), \
                etag = COALESCE($3, etag), \
                sync_status = $4, \
                updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(external_id)
        .bind(etag)
        .bind(EventSyncStatus::Synced.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Apply an inbound delta and persist the sync token atomically.
    ///
    /// With `full_sync`, synced local events whose external id is absent
    /// from `changes` are marked deleted: they no longer exist remotely.
    /// On success the calendar moves to `synced`.
    pub async fn apply_remote_changes(
        pool: &PgPool,
        token_id: DbId,
        user_id: DbId,
        calendar_id: &str,
        changes: &[RemoteChange],
        full_sync: bool,
        next_sync_token: Option<&str>,
    ) -> Result<AppliedChanges, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut applied = AppliedChanges::default();

        for change in changes {
            match change {
                RemoteChange::Upsert(data) => {
                    match Self::upsert_remote(&mut *tx, user_id, calendar_id, data).await? {
                        UpsertResult::Inserted => applied.added += 1,
                        UpsertResult::Updated => applied.updated += 1,
                        UpsertResult::Unchanged => applied.unchanged += 1,
                    }
                }
                RemoteChange::Deleted { external_id } => {
                    if Self::mark_remote_deleted(&mut *tx, user_id, calendar_id, external_id).await? {
                        applied.deleted += 1;
                    } else {
                        applied.unchanged += 1;
                    }
                }
                RemoteChange::Unreadable { .. } => applied.unchanged += 1,
            }
        }

        if full_sync {
            let present: Vec<String> = changes
                .iter()
                .filter(|c| !matches!(c, RemoteChange::Deleted { .. }))
                .map(|c| c.external_id().to_string())
                .collect();
            let result = sqlx::query(
                "UPDATE calendar_events \
                 SET deleted_at = NOW(), updated_at = NOW() \
                 WHERE user_id = $1 AND calendar_id = $2 \
                   AND external_id IS NOT NULL AND deleted_at IS NULL \
                   AND sync_status = $3 \
                   AND NOT (external_id = ANY($4))",
            )
            .bind(user_id)
            .bind(calendar_id)
            .bind(EventSyncStatus::Synced.as_str())
            .bind(&present)
            .execute(&mut *tx)
            .await?;
            applied.deleted += result.rows_affected() as u32;
        }

        sqlx::query(
            "UPDATE calendar_tokens SET \
                sync_token = COALESCE($2, sync_token), \
                sync_state = $3, \
                last_sync_at = NOW(), \
                last_sync_error = NULL, \
                updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(token_id)
        .bind(next_sync_token)
        .bind(ConnectionState::Synced.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(applied)
    }

    /// Insert or overwrite the local mirror of a remote event.
    ///
    /// Remote wins: any local row with a different etag is overwritten,
    /// including one with unpushed local edits. A row with the same etag is
    /// left alone.
    async fn upsert_remote(
        conn: &mut PgConnection,
        user_id: DbId,
        calendar_id: &str,
        data: &RemoteEventData,
    ) -> Result<UpsertResult, sqlx::Error> {
        let inserted: Option<bool> = sqlx::query_scalar(
            "INSERT INTO calendar_events \
                (user_id, calendar_id, title, description, location, start_time, end_time, \
                 all_day, external_id, etag, sync_status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT ON CONSTRAINT uq_calendar_events_external DO UPDATE SET \
                title = EXCLUDED.title, \
                description = EXCLUDED.description, \
                location = EXCLUDED.location, \
                start_time = EXCLUDED.start_time, \
                end_time = EXCLUDED.end_time, \
                all_day = EXCLUDED.all_day, \
                etag = EXCLUDED.etag, \
                sync_status = EXCLUDED.sync_status, \
                deleted_at = NULL, \
                updated_at = NOW() \
             WHERE calendar_events.etag IS DISTINCT FROM EXCLUDED.etag \
             RETURNING (xmax = 0)",
        )
        .bind(user_id)
        .bind(calendar_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.location)
        .bind(data.start_time)
        .bind(data.end_time)
        .bind(data.all_day)
        .bind(&data.external_id)
        .bind(&data.etag)
        .bind(EventSyncStatus::Synced.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(match inserted {
            Some(true) => UpsertResult::Inserted,
            Some(false) => UpsertResult::Updated,
            None => UpsertResult::Unchanged,
        })
    }

    /// Mark the mirror of a remotely deleted event as deleted.
    ///
    /// A local deletion still pending outbound is settled as synced, since
    /// there is nothing left to push.
    async fn mark_remote_deleted(
        conn: &mut PgConnection,
        user_id: DbId,
        calendar_id: &str,
        external_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE calendar_events SET \
                deleted_at = COALESCE(deleted_at, NOW()), \
                sync_status = $4, \
                updated_at = NOW() \
             WHERE user_id = $1 AND calendar_id = $2 AND external_id = $3 \
               AND (deleted_at IS NULL OR sync_status <> $4)",
        )
        .bind(user_id)
        .bind(calendar_id)
        .bind(external_id)
        .bind(EventSyncStatus::Synced.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
