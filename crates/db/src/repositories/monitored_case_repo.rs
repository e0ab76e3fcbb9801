//! Repository for the `monitored_cases` table.

use litis_core::types::DbId;
use sqlx::PgPool;

use crate::models::monitored_case::{CreateMonitoredCase, MonitoredCase};

const COLUMNS: &str = "id, user_id, case_number, case_key, court_name, party_name, is_active, \
                       created_at, updated_at";

pub struct MonitoredCaseRepo;

impl MonitoredCaseRepo {
    /// Insert a monitored case for `user_id`.
    ///
    /// `case_key` is the canonical key of `input.case_number`, computed and
    /// validated by the caller.
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        input: &CreateMonitoredCase,
        case_key: Option<&str>,
    ) -> Result<MonitoredCase, sqlx::Error> {
        let query = format!(
            "INSERT INTO monitored_cases (user_id, case_number, case_key, court_name, party_name) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MonitoredCase>(&query)
            .bind(user_id)
            .bind(input.case_number.as_deref().map(str::trim))
            .bind(case_key)
            .bind(input.court_name.as_deref().map(str::trim))
            .bind(input.party_name.as_deref().map(str::trim))
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<MonitoredCase>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM monitored_cases WHERE id = $1");
        sqlx::query_as::<_, MonitoredCase>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a case only if it belongs to `user_id`.
    pub async fn find_for_user(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<MonitoredCase>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM monitored_cases WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, MonitoredCase>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<MonitoredCase>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM monitored_cases WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, MonitoredCase>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Every active monitored case across all users; the matcher's input.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<MonitoredCase>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM monitored_cases WHERE is_active ORDER BY id");
        sqlx::query_as::<_, MonitoredCase>(&query).fetch_all(pool).await
    }

    /// Delete a case and, by cascade, its alerts.
    ///
    /// Returns `true` if a row owned by `user_id` was deleted.
    pub async fn delete(pool: &PgPool, id: DbId, user_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM monitored_cases WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
