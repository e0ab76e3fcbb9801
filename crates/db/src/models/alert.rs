//! Alert entity, API projection, and delivery bookkeeping rows.

use chrono::NaiveDate;
use litis_core::delivery::PendingAlert;
use litis_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `alerts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Alert {
    pub id: DbId,
    pub user_id: DbId,
    pub monitored_case_id: DbId,
    pub bulletin_entry_id: DbId,
    pub match_kind: String,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub whatsapp_sent: Option<bool>,
    pub email_sent: Option<bool>,
    pub dispatched_at: Option<Timestamp>,
    pub delivery_attempts: i32,
    pub created_at: Timestamp,
}

/// An alert joined with its bulletin entry and monitored case, for listing.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AlertDetail {
    pub id: DbId,
    pub monitored_case_id: DbId,
    pub bulletin_entry_id: DbId,
    pub match_kind: String,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub whatsapp_sent: Option<bool>,
    pub email_sent: Option<bool>,
    pub created_at: Timestamp,
    pub bulletin_date: NaiveDate,
    pub court_name: String,
    pub bulletin_case_number: String,
    pub source_url: Option<String>,
    pub monitored_case_number: Option<String>,
    pub party_name: Option<String>,
}

/// Result of the at-most-once alert insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordedMatch {
    /// `false` when the (case, entry) pair already had an alert.
    pub created: bool,
    pub alert_id: DbId,
}

/// Row shape of the pending-delivery query.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct PendingAlertRow {
    pub alert_id: DbId,
    pub user_id: DbId,
    pub bulletin_date: NaiveDate,
    pub court_name: String,
    pub case_number: Option<String>,
    pub party_name: Option<String>,
    pub whatsapp_sent: Option<bool>,
    pub email_sent: Option<bool>,
    pub dispatched: bool,
}

impl From<PendingAlertRow> for PendingAlert {
    fn from(row: PendingAlertRow) -> Self {
        Self {
            alert_id: row.alert_id,
            user_id: row.user_id,
            bulletin_date: row.bulletin_date,
            court_name: row.court_name,
            case_number: row.case_number,
            party_name: row.party_name,
            whatsapp_sent: row.whatsapp_sent,
            email_sent: row.email_sent,
            dispatched: row.dispatched,
        }
    }
}
