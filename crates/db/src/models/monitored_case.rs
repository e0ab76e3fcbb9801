//! Monitored case entity and DTOs.

use litis_core::matching::MonitoredTarget;
use litis_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `monitored_cases` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MonitoredCase {
    pub id: DbId,
    pub user_id: DbId,
    pub case_number: Option<String>,
    /// Canonical `number/year` key derived from `case_number`.
    pub case_key: Option<String>,
    pub court_name: Option<String>,
    pub party_name: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MonitoredCase {
    /// The fields the matcher indexes.
    pub fn to_target(&self) -> MonitoredTarget {
        MonitoredTarget {
            id: self.id,
            user_id: self.user_id,
            case_number: self.case_number.clone(),
            court_name: self.court_name.clone(),
            party_name: self.party_name.clone(),
        }
    }
}

/// DTO for creating a monitored case.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMonitoredCase {
    pub case_number: Option<String>,
    pub court_name: Option<String>,
    pub party_name: Option<String>,
}
