//! Repository for the `alerts` table.
//!
//! [`AlertRepo::record_match`] is the deduplication point of the pipeline:
//! at most one alert exists per (monitored case, bulletin entry) pair,
//! enforced by `uq_alerts_case_entry` rather than a check-then-insert.

use std::time::Duration;

use litis_core::delivery::{DeliveryOutcome, PendingAlert};
use litis_core::matching::MatchKind;
use litis_core::types::DbId;
use sqlx::PgPool;

use crate::models::alert::{Alert, AlertDetail, PendingAlertRow, RecordedMatch};

const COLUMNS: &str = "id, user_id, monitored_case_id, bulletin_entry_id, match_kind, is_read, \
                       read_at, whatsapp_sent, email_sent, dispatched_at, delivery_attempts, \
                       created_at";

const DETAIL_COLUMNS: &str = "a.id, a.monitored_case_id, a.bulletin_entry_id, a.match_kind, \
                              a.is_read, a.read_at, a.whatsapp_sent, a.email_sent, a.created_at, \
                              b.bulletin_date, b.court_name, b.case_number AS bulletin_case_number, \
                              b.source_url, mc.case_number AS monitored_case_number, mc.party_name";

/// Advisory lock key serializing dispatch claims.
const DISPATCH_CLAIM_LOCK: i64 = 0x6c69_7469_7301;

pub struct AlertRepo;

impl AlertRepo {
    /// Record a match, creating the alert only if the pair has none yet.
    ///
    /// Safe under concurrent calls for the same pair: the loser of the insert
    /// race reads back the winner's id and reports `created: false`. The
    /// alert is owned by the monitored case's user.
    ///
    /// Returns [`sqlx::Error::RowNotFound`] if the monitored case does not
    /// exist.
    pub async fn record_match(
        pool: &PgPool,
        monitored_case_id: DbId,
        bulletin_entry_id: DbId,
        kind: MatchKind,
    ) -> Result<RecordedMatch, sqlx::Error> {
        let inserted: Option<DbId> = sqlx::query_scalar(
            "INSERT INTO alerts (user_id, monitored_case_id, bulletin_entry_id, match_kind) \
             SELECT mc.user_id, mc.id, $2, $3 FROM monitored_cases mc WHERE mc.id = $1 \
             ON CONFLICT ON CONSTRAINT uq_alerts_case_entry DO NOTHING \
             RETURNING id",
        )
        .bind(monitored_case_id)
        .bind(bulletin_entry_id)
        .bind(kind.as_str())
        .fetch_optional(pool)
        .await?;

        if let Some(alert_id) = inserted {
            return Ok(RecordedMatch {
                created: true,
                alert_id,
            });
        }

        let existing: Option<DbId> = sqlx::query_scalar(
            "SELECT id FROM alerts WHERE monitored_case_id = $1 AND bulletin_entry_id = $2",
        )
        .bind(monitored_case_id)
        .bind(bulletin_entry_id)
        .fetch_optional(pool)
        .await?;

        existing
            .map(|alert_id| RecordedMatch {
                created: false,
                alert_id,
            })
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Alert>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM alerts WHERE id = $1");
        sqlx::query_as::<_, Alert>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Number of alerts recorded for a monitored case.
    pub async fn count_for_case(pool: &PgPool, monitored_case_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE monitored_case_id = $1")
            .bind(monitored_case_id)
            .fetch_one(pool)
            .await
    }

    /// Claim alerts that still need a delivery attempt on some channel.
    ///
    /// Includes never-dispatched alerts and dispatched alerts with a failed
    /// channel, as long as fewer than `max_attempts` sweeps have touched
    /// them. Claimed rows are leased for `lease` and skipped by other claims
    /// until the lease is released or expires. Claims are serialized on an
    /// advisory lock so concurrent sweeps never split one user's batch.
    /// Ordered so alerts of one user and date are adjacent.
    pub async fn claim_pending_delivery(
        pool: &PgPool,
        max_attempts: i32,
        limit: i64,
        lease: Duration,
    ) -> Result<Vec<PendingAlert>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(DISPATCH_CLAIM_LOCK)
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query_as::<_, PendingAlertRow>(
            "WITH claimed AS ( \
                UPDATE alerts SET dispatch_claimed_until = NOW() + make_interval(secs => $3) \
                WHERE id IN ( \
                    SELECT a.id FROM alerts a \
                    JOIN bulletin_entries b ON b.id = a.bulletin_entry_id \
                    WHERE a.delivery_attempts < $1 \
                      AND (a.dispatched_at IS NULL OR a.whatsapp_sent = false OR a.email_sent = false) \
                      AND (a.dispatch_claimed_until IS NULL OR a.dispatch_claimed_until < NOW()) \
                    ORDER BY a.user_id, b.bulletin_date, a.id \
                    LIMIT $2 \
                    FOR UPDATE OF a SKIP LOCKED \
                ) \
                RETURNING id, user_id, monitored_case_id, bulletin_entry_id, \
                          whatsapp_sent, email_sent, dispatched_at \
             ) \
             SELECT c.id AS alert_id, c.user_id, b.bulletin_date, b.court_name, \
                    mc.case_number, mc.party_name, c.whatsapp_sent, c.email_sent, \
                    (c.dispatched_at IS NOT NULL) AS dispatched \
             FROM claimed c \
             JOIN bulletin_entries b ON b.id = c.bulletin_entry_id \
             JOIN monitored_cases mc ON mc.id = c.monitored_case_id \
             ORDER BY c.user_id, b.bulletin_date, c.id",
        )
        .bind(max_attempts)
        .bind(limit)
        .bind(lease.as_secs_f64())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows.into_iter().map(PendingAlert::from).collect())
    }

    /// Drop the dispatch lease on alerts a sweep gave up on without
    /// recording an outcome.
    pub async fn release_claims(pool: &PgPool, alert_ids: &[DbId]) -> Result<(), sqlx::Error> {
        if alert_ids.is_empty() {
            return Ok(());
        }
        sqlx::query("UPDATE alerts SET dispatch_claimed_until = NULL WHERE id = ANY($1)")
            .bind(alert_ids)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Persist the outcome of one dispatch sweep for an alert.
    ///
    /// A `None` outcome leaves that channel's flag untouched (the channel was
    /// not attempted in this sweep). Always stamps `dispatched_at` (first
    /// sweep only), increments `delivery_attempts`, and releases the claim.
    pub async fn record_dispatch(
        pool: &PgPool,
        alert_id: DbId,
        whatsapp: Option<DeliveryOutcome>,
        email: Option<DeliveryOutcome>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE alerts SET \
                whatsapp_sent = CASE WHEN $2 THEN $3 ELSE whatsapp_sent END, \
                email_sent = CASE WHEN $4 THEN $5 ELSE email_sent END, \
                dispatched_at = COALESCE(dispatched_at, NOW()), \
                delivery_attempts = delivery_attempts + 1, \
                dispatch_claimed_until = NULL \
             WHERE id = $1",
        )
        .bind(alert_id)
        .bind(whatsapp.is_some())
        .bind(whatsapp.and_then(|o| o.as_flag()))
        .bind(email.is_some())
        .bind(email.and_then(|o| o.as_flag()))
        .execute(pool)
        .await?;
        Ok(())
    }

    /// List a user's alerts, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AlertDetail>, sqlx::Error> {
        let filter = if unread_only {
            "AND a.is_read = false"
        } else {
            ""
        };
        let query = format!(
            "SELECT {DETAIL_COLUMNS} \
             FROM alerts a \
             JOIN bulletin_entries b ON b.id = a.bulletin_entry_id \
             JOIN monitored_cases mc ON mc.id = a.monitored_case_id \
             WHERE a.user_id = $1 {filter} \
             ORDER BY a.created_at DESC, a.id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, AlertDetail>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Mark an alert as read.
    ///
    /// Returns `true` if an unread alert owned by `user_id` was updated.
    pub async fn mark_read(pool: &PgPool, id: DbId, user_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE alerts SET is_read = true, read_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND is_read = false",
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn unread_count(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE user_id = $1 AND is_read = false")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }
}
