//! Matching of newly ingested entries against monitored cases.
//!
//! Every unprocessed entry is matched against an index of all active
//! monitored cases, each match is recorded through the at-most-once alert
//! insert, and the entry is marked processed. Entries are independent: one
//! failing entry is logged and counted, never stopping the run.

use litis_core::error::CoreError;
use litis_core::matching::{CaseIndex, CourtMatchPolicy};
use litis_core::types::DbId;
use litis_db::models::bulletin::BulletinEntry;
use litis_db::repositories::{AlertRepo, BulletinEntryRepo, MonitoredCaseRepo};
use litis_db::DbPool;
use serde::Serialize;

use crate::error::PipelineError;

/// Entries fetched per round of a matching run.
pub const DEFAULT_MATCH_BATCH: i64 = 500;

/// Outcome of one matching run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchRunReport {
    pub entries_processed: usize,
    /// Entries that hit a database error; left unprocessed for the next run
    /// and counted once per run.
    pub entries_failed: usize,
    /// Malformed entries, marked processed without matching.
    pub entries_skipped: usize,
    pub matches_found: usize,
    pub alerts_created: usize,
    /// Active monitored cases that could not be indexed.
    pub cases_rejected: usize,
    pub new_alert_ids: Vec<DbId>,
}

enum EntryOutcome {
    Matched { found: usize, created: Vec<DbId> },
    Skipped(CoreError),
}

/// Match every unprocessed entry.
pub async fn run_matching(
    pool: &DbPool,
    policy: CourtMatchPolicy,
    batch_size: i64,
) -> Result<MatchRunReport, PipelineError> {
    let cases = MonitoredCaseRepo::list_active(pool).await?;
    let index = CaseIndex::build(cases.iter().map(|c| c.to_target()), policy);

    let mut report = MatchRunReport {
        cases_rejected: index.rejected().len(),
        ..MatchRunReport::default()
    };
    if !index.rejected().is_empty() {
        tracing::warn!(case_ids = ?index.rejected(), "Monitored cases could not be indexed");
    }

    // Keyset cursor: entries that failed stay behind it until the next run.
    let mut after_id: DbId = 0;
    loop {
        let entries = BulletinEntryRepo::list_unprocessed(pool, after_id, batch_size).await?;
        let Some(last) = entries.last() else {
            break;
        };
        after_id = last.id;
        let fetched = entries.len();

        for entry in &entries {
            match process_entry(pool, &index, entry).await {
                Ok(EntryOutcome::Matched { found, created }) => {
                    report.entries_processed += 1;
                    report.matches_found += found;
                    report.alerts_created += created.len();
                    report.new_alert_ids.extend(created);
                }
                Ok(EntryOutcome::Skipped(e)) => {
                    tracing::warn!(entry_id = entry.id, error = %e, "Skipping malformed bulletin entry");
                    report.entries_skipped += 1;
                }
                Err(e) => {
                    tracing::error!(entry_id = entry.id, error = %e, "Failed to match bulletin entry");
                    report.entries_failed += 1;
                }
            }
        }

        if (fetched as i64) < batch_size {
            break;
        }
    }

    tracing::info!(
        processed = report.entries_processed,
        failed = report.entries_failed,
        skipped = report.entries_skipped,
        matches = report.matches_found,
        alerts_created = report.alerts_created,
        "Bulletin matching run complete"
    );
    Ok(report)
}

async fn process_entry(
    pool: &DbPool,
    index: &CaseIndex,
    entry: &BulletinEntry,
) -> Result<EntryOutcome, sqlx::Error> {
    let candidates = match index.match_entry(entry.view()) {
        Ok(c) => c,
        Err(e) => {
            BulletinEntryRepo::mark_processed(pool, entry.id).await?;
            return Ok(EntryOutcome::Skipped(e));
        }
    };

    let mut created = Vec::new();
    for candidate in &candidates {
        let recorded = AlertRepo::record_match(
            pool,
            candidate.monitored_case_id,
            candidate.bulletin_entry_id,
            candidate.kind,
        )
        .await?;
        if recorded.created {
            tracing::debug!(
                alert_id = recorded.alert_id,
                user_id = candidate.user_id,
                entry_id = entry.id,
                kind = candidate.kind.as_str(),
                "Alert created"
            );
            created.push(recorded.alert_id);
        }
    }

    BulletinEntryRepo::mark_processed(pool, entry.id).await?;
    Ok(EntryOutcome::Matched {
        found: candidates.len(),
        created,
    })
}
