//! Alert delivery bookkeeping: channels, per-channel tri-state outcomes, and
//! grouping of pending alerts into one batch per user and bulletin date.
//!
//! Each alert row carries a nullable boolean per channel (`whatsapp_sent`,
//! `email_sent`) plus a `dispatched_at` timestamp:
//!
//! | flag    | `dispatched_at` | meaning                               |
//! |---------|-----------------|---------------------------------------|
//! | `NULL`  | `NULL`          | not attempted yet                     |
//! | `true`  | set             | attempted and succeeded               |
//! | `false` | set             | attempted and failed (retryable)      |
//! | `NULL`  | set             | not applicable, channel was disabled  |

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::DbId;

/// Maximum number of dispatch sweeps an alert takes part in before failed
/// channels are left alone.
pub const MAX_DELIVERY_ATTEMPTS: i32 = 3;

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// External notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    WhatsApp,
    Email,
}

impl Channel {
    /// Channel name as stored in `notification_log.channel`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WhatsApp => "whatsapp",
            Self::Email => "email",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of one channel's dispatch for one alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed,
    /// The user has the channel disabled or has no contact for it.
    NotApplicable,
}

impl DeliveryOutcome {
    /// Value persisted in the alert's per-channel flag column.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Sent => Some(true),
            Self::Failed => Some(false),
            Self::NotApplicable => None,
        }
    }

    /// Status written to the notification log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::NotApplicable => "skipped",
        }
    }
}

// ---------------------------------------------------------------------------
// Pending alerts and batches
// ---------------------------------------------------------------------------

/// An alert awaiting delivery, joined with the data needed for the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingAlert {
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

impl PendingAlert {
    fn flag(&self, channel: Channel) -> Option<bool> {
        match channel {
            Channel::WhatsApp => self.whatsapp_sent,
            Channel::Email => self.email_sent,
        }
    }

    /// Whether this alert still needs a send on `channel`.
    ///
    /// Never-dispatched alerts need every channel; previously dispatched
    /// alerts only need channels that failed.
    pub fn needs(&self, channel: Channel) -> bool {
        match self.flag(channel) {
            Some(true) => false,
            Some(false) => true,
            None => !self.dispatched,
        }
    }

    /// Human label for the monitored case: its case number, else the party name.
    pub fn case_label(&self) -> String {
        self.case_number
            .as_deref()
            .or(self.party_name.as_deref())
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_else(|| format!("#{}", self.alert_id))
    }
}

/// All pending alerts of one user for one bulletin date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertBatch {
    pub user_id: DbId,
    pub bulletin_date: NaiveDate,
    pub alerts: Vec<PendingAlert>,
}

impl AlertBatch {
    /// Alerts of this batch that still need `channel`.
    pub fn needing(&self, channel: Channel) -> Vec<&PendingAlert> {
        self.alerts.iter().filter(|a| a.needs(channel)).collect()
    }
}

/// Group pending alerts into one batch per (user, bulletin date).
///
/// Batches are ordered by user id then date; alerts keep their input order.
pub fn batch_alerts(alerts: Vec<PendingAlert>) -> Vec<AlertBatch> {
    let mut groups: BTreeMap<(DbId, NaiveDate), Vec<PendingAlert>> = BTreeMap::new();
    for alert in alerts {
        groups
            .entry((alert.user_id, alert.bulletin_date))
            .or_default()
            .push(alert);
    }
    groups
        .into_iter()
        .map(|((user_id, bulletin_date), alerts)| AlertBatch {
            user_id,
            bulletin_date,
            alerts,
        })
        .collect()
}
