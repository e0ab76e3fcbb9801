//! Historical check for a newly monitored case.
//!
//! Matches one monitored case against every stored bulletin entry, not just
//! new ones, and records alerts for the hits. Running it twice creates no
//! additional alerts. Delivery is left to the next notification sweep.

use chrono::NaiveDate;
use litis_core::error::CoreError;
use litis_core::matching::{CaseIndex, CourtMatchPolicy, NamePattern};
use litis_core::types::DbId;
use litis_db::repositories::{AlertRepo, BulletinEntryRepo, MonitoredCaseRepo};
use litis_db::DbPool;
use serde::Serialize;

use crate::error::PipelineError;

/// One historical entry that matched the case.
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalMatch {
    pub alert_id: DbId,
    pub bulletin_entry_id: DbId,
    pub bulletin_date: NaiveDate,
    pub court_name: String,
    /// `false` when the alert already existed.
    pub created: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoricalCheckReport {
    pub entries_scanned: usize,
    pub matches_found: usize,
    pub alerts_created: usize,
    pub matches: Vec<HistoricalMatch>,
}

/// Match `monitored_case_id` (owned by `user_id`) against all stored entries.
///
/// Returns [`CoreError::NotFound`] if the case does not exist or belongs to
/// another user.
pub async fn check_historical_matches(
    pool: &DbPool,
    user_id: DbId,
    monitored_case_id: DbId,
    policy: CourtMatchPolicy,
) -> Result<HistoricalCheckReport, PipelineError> {
    let case = MonitoredCaseRepo::find_for_user(pool, monitored_case_id, user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "monitored_case",
            id: monitored_case_id,
        })?;

    let entries = match (&case.case_key, case.party_name.as_deref()) {
        (Some(key), _) => BulletinEntryRepo::list_by_case_key(pool, key).await?,
        (None, Some(name)) if case.case_number.is_none() => match NamePattern::parse(name) {
            Some(pattern) => BulletinEntryRepo::list_containing_all(pool, pattern.tokens()).await?,
            None => Vec::new(),
        },
        _ => Vec::new(),
    };

    let index = CaseIndex::build([case.to_target()], policy);
    let mut report = HistoricalCheckReport {
        entries_scanned: entries.len(),
        ..HistoricalCheckReport::default()
    };

    for entry in &entries {
        let candidates = match index.match_entry(entry.view()) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(entry_id = entry.id, error = %e, "Skipping malformed historical entry");
                continue;
            }
        };
        for candidate in candidates {
            let recorded =
                AlertRepo::record_match(pool, case.id, entry.id, candidate.kind).await?;
            report.matches_found += 1;
            if recorded.created {
                report.alerts_created += 1;
            }
            report.matches.push(HistoricalMatch {
                alert_id: recorded.alert_id,
                bulletin_entry_id: entry.id,
                bulletin_date: entry.bulletin_date,
                court_name: entry.court_name.clone(),
                created: recorded.created,
            });
        }
    }

    tracing::info!(
        user_id,
        monitored_case_id,
        scanned = report.entries_scanned,
        matches = report.matches_found,
        alerts_created = report.alerts_created,
        "Historical check complete"
    );
    Ok(report)
}
