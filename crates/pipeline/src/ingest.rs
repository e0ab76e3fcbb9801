//! Bulletin ingestion.
//!
//! Entries are normalized, keyed, and hashed before insertion. The content
//! hash covers the normalized court, case number, and text, so a source
//! republishing the same entry (or a scheduler retrying the same batch)
//! never produces a second row.

use litis_core::case_number::CaseNumberKey;
use litis_core::error::CoreError;
use litis_core::normalize::normalize;
use litis_core::types::DbId;
use litis_db::models::bulletin::{IngestBulletinEntry, NormalizedBulletinEntry};
use litis_db::repositories::BulletinEntryRepo;
use litis_db::DbPool;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::PipelineError;

/// Field separator inside the hashed content; cannot occur in normalized text.
const HASH_SEPARATOR: char = '\u{1f}';

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub received: usize,
    pub inserted: usize,
    /// Entries already stored (or repeated within the batch).
    pub duplicates: usize,
    /// Entries refused by validation; see `errors`.
    pub rejected: usize,
    pub inserted_ids: Vec<DbId>,
    pub errors: Vec<String>,
}

/// SHA-256 hex digest identifying an entry's content.
pub fn content_hash(court_normalized: &str, case_normalized: &str, text_normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(court_normalized.as_bytes());
    hasher.update(HASH_SEPARATOR.to_string().as_bytes());
    hasher.update(case_normalized.as_bytes());
    hasher.update(HASH_SEPARATOR.to_string().as_bytes());
    hasher.update(text_normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Validate and normalize one published entry.
pub fn prepare_entry(input: IngestBulletinEntry) -> Result<NormalizedBulletinEntry, CoreError> {
    let source = input.source.trim();
    if source.is_empty() {
        return Err(CoreError::Validation("source must not be empty".into()));
    }

    let court_name_normalized = normalize(&input.court_name);
    let case_number_normalized = normalize(&input.case_number);
    let raw_text_normalized = normalize(&input.raw_text);
    if case_number_normalized.is_empty() && raw_text_normalized.is_empty() {
        return Err(CoreError::Validation(
            "bulletin entry needs a case number or text".into(),
        ));
    }

    let case_key = CaseNumberKey::parse(&case_number_normalized).map(|k| k.to_string());
    let content_hash = content_hash(
        &court_name_normalized,
        &case_number_normalized,
        &raw_text_normalized,
    );

    Ok(NormalizedBulletinEntry {
        bulletin_date: input.bulletin_date,
        court_name: input.court_name.trim().to_string(),
        court_name_normalized,
        case_number: input.case_number.trim().to_string(),
        case_number_normalized,
        case_key,
        raw_text: input.raw_text,
        raw_text_normalized,
        source_url: input.source_url.filter(|u| !u.trim().is_empty()),
        source: source.to_string(),
        content_hash,
    })
}

/// Store a batch of published entries, skipping duplicates and invalid
/// entries.
pub async fn ingest_entries(
    pool: &DbPool,
    entries: Vec<IngestBulletinEntry>,
) -> Result<IngestReport, PipelineError> {
    let mut report = IngestReport {
        received: entries.len(),
        ..IngestReport::default()
    };

    let mut prepared = Vec::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        match prepare_entry(entry) {
            Ok(p) => prepared.push(p),
            Err(e) => {
                report.rejected += 1;
                report.errors.push(format!("entry {i}: {e}"));
            }
        }
    }

    if !prepared.is_empty() {
        report.inserted_ids = BulletinEntryRepo::insert_batch(pool, &prepared).await?;
    }
    report.inserted = report.inserted_ids.len();
    report.duplicates = prepared.len() - report.inserted;

    tracing::info!(
        received = report.received,
        inserted = report.inserted,
        duplicates = report.duplicates,
        rejected = report.rejected,
        "Bulletin entries ingested"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    fn input(court: &str, case_number: &str, text: &str) -> IngestBulletinEntry {
        IngestBulletinEntry {
            bulletin_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            court_name: court.into(),
            case_number: case_number.into(),
            raw_text: text.into(),
            source_url: Some("  ".into()),
            source: " tsj-cdmx ".into(),
        }
    }

    #[test]
    fn prepares_key_and_normalized_fields() {
        let e = prepare_entry(input("Juzgado 1° Civil", "Exp. 00017/2025", "Acuerdo")).unwrap();
        assert_eq!(e.case_key.as_deref(), Some("17/2025"));
        assert_eq!(e.source, "tsj-cdmx");
        assert_eq!(e.source_url, None);
        assert_eq!(e.content_hash.len(), 64);
    }

    #[test]
    fn hash_ignores_accents_case_and_spacing() {
        let a = prepare_entry(input("Juzgado Primero Civil", "17/2025", "Se acordó")).unwrap();
        let b = prepare_entry(input("JUZGADO  primero civil", " 17/2025 ", "SE ACORDO")).unwrap();
        assert_eq!(a.content_hash, b.content_hash);

        let c = prepare_entry(input("Juzgado Primero Civil", "18/2025", "Se acordó")).unwrap();
        assert_ne!(a.content_hash, c.content_hash);
    }

    #[test]
    fn fields_do_not_bleed_into_each_other() {
        assert_ne!(content_hash("A B", "C", ""), content_hash("A", "B C", ""));
    }

    #[test]
    fn entry_without_case_number_or_text_is_rejected() {
        assert_matches!(prepare_entry(input("Juzgado", " ", "")), Err(CoreError::Validation(_)));
        let mut no_source = input("Juzgado", "17/2025", "");
        no_source.source = "".into();
        assert_matches!(prepare_entry(no_source), Err(CoreError::Validation(_)));
    }

    #[test]
    fn text_only_entry_has_no_key() {
        let e = prepare_entry(input("Juzgado", "", "GARCIA LOPEZ MARIA vs BANCO")).unwrap();
        assert_eq!(e.case_key, None);
    }
}
