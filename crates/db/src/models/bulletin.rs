//! Bulletin entry entity and ingestion DTOs.

use chrono::NaiveDate;
use litis_core::matching::EntryView;
use litis_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `bulletin_entries` table. Append-only.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BulletinEntry {
    pub id: DbId,
    pub bulletin_date: NaiveDate,
    pub court_name: String,
    pub court_name_normalized: String,
    pub case_number: String,
    pub case_number_normalized: String,
    pub case_key: Option<String>,
    pub raw_text: String,
    pub raw_text_normalized: String,
    pub source_url: Option<String>,
    pub source: String,
    pub content_hash: String,
    pub processed_at: Option<Timestamp>,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl BulletinEntry {
    /// Borrowed view handed to the matcher.
    pub fn view(&self) -> EntryView<'_> {
        EntryView {
            id: self.id,
            court_name: &self.court_name,
            case_number: &self.case_number,
            raw_text: &self.raw_text,
        }
    }
}

/// One entry as published by a bulletin source, before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestBulletinEntry {
    pub bulletin_date: NaiveDate,
    pub court_name: String,
    pub case_number: String,
    #[serde(default)]
    pub raw_text: String,
    pub source_url: Option<String>,
    pub source: String,
}

/// A fully prepared entry ready for insertion.
#[derive(Debug, Clone)]
pub struct NormalizedBulletinEntry {
    pub bulletin_date: NaiveDate,
    pub court_name: String,
    pub court_name_normalized: String,
    pub case_number: String,
    pub case_number_normalized: String,
    pub case_key: Option<String>,
    pub raw_text: String,
    pub raw_text_normalized: String,
    pub source_url: Option<String>,
    pub source: String,
    pub content_hash: String,
}
