//! Repository for the `bulletin_entries` table.
//!
//! Entries are append-only. The only mutations are marking an entry as
//! processed by the matcher and soft-deleting an erroneous one.

use litis_core::types::DbId;
use sqlx::PgPool;

use crate::models::bulletin::{BulletinEntry, NormalizedBulletinEntry};

const COLUMNS: &str = "id, bulletin_date, court_name, court_name_normalized, case_number, \
                       case_number_normalized, case_key, raw_text, raw_text_normalized, \
                       source_url, source, content_hash, processed_at, deleted_at, created_at";

pub struct BulletinEntryRepo;

impl BulletinEntryRepo {
    /// Insert a batch of entries in one transaction.
    ///
    /// Entries whose (date, source, content hash) already exist are skipped.
    /// Returns the ids of the rows actually inserted, in input order.
    pub async fn insert_batch(
        pool: &PgPool,
        entries: &[NormalizedBulletinEntry],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut inserted = Vec::with_capacity(entries.len());

        for entry in entries {
            let id: Option<DbId> = sqlx::query_scalar(
                "INSERT INTO bulletin_entries \
                    (bulletin_date, court_name, court_name_normalized, case_number, \
                     case_number_normalized, case_key, raw_text, raw_text_normalized, \
                     source_url, source, content_hash) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
                 ON CONFLICT ON CONSTRAINT uq_bulletin_entries_content DO NOTHING \
                 RETURNING id",
            )
            .bind(entry.bulletin_date)
            .bind(&entry.court_name)
            .bind(&entry.court_name_normalized)
            .bind(&entry.case_number)
            .bind(&entry.case_number_normalized)
            .bind(&entry.case_key)
            .bind(&entry.raw_text)
            .bind(&entry.raw_text_normalized)
            .bind(&entry.source_url)
            .bind(&entry.source)
            .bind(&entry.content_hash)
            .fetch_optional(&mut *tx)
            .await?;
            inserted.extend(id);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<BulletinEntry>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM bulletin_entries WHERE id = $1");
        sqlx::query_as::<_, BulletinEntry>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Entries not yet run through the matcher, oldest first.
    /// Unprocessed entries with an id above `after_id`, in id order.
    pub async fn list_unprocessed(
        pool: &PgPool,
        after_id: DbId,
        limit: i64,
    ) -> Result<Vec<BulletinEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM bulletin_entries \
             WHERE processed_at IS NULL AND deleted_at IS NULL AND id > $1 \
             ORDER BY id \
             LIMIT $2"
        );
        sqlx::query_as::<_, BulletinEntry>(&query)
            .bind(after_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    pub async fn mark_processed(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE bulletin_entries SET processed_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Hide an erroneous entry from matching and backfill.
    ///
    /// Returns `false` if the entry does not exist or is already deleted.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bulletin_entries SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Historical entries whose case key equals `case_key`.
    pub async fn list_by_case_key(
        pool: &PgPool,
        case_key: &str,
    ) -> Result<Vec<BulletinEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM bulletin_entries \
             WHERE case_key = $1 AND deleted_at IS NULL \
             ORDER BY bulletin_date, id"
        );
        sqlx::query_as::<_, BulletinEntry>(&query)
            .bind(case_key)
            .fetch_all(pool)
            .await
    }

    /// Historical entries whose normalized text contains every one of
    /// `tokens` as a substring.
    ///
    /// This is a coarse prefilter; callers re-check whole-token matches.
    pub async fn list_containing_all(
        pool: &PgPool,
        tokens: &[String],
    ) -> Result<Vec<BulletinEntry>, sqlx::Error> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let patterns: Vec<String> = tokens
            .iter()
            .map(|t| format!("%{}%", t.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")))
            .collect();
        let query = format!(
            "SELECT {COLUMNS} FROM bulletin_entries \
             WHERE deleted_at IS NULL AND raw_text_normalized LIKE ALL($1) \
             ORDER BY bulletin_date, id"
        );
        sqlx::query_as::<_, BulletinEntry>(&query)
            .bind(&patterns)
            .fetch_all(pool)
            .await
    }
}
