//! User contact data used for notification delivery.

use litis_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub full_name: Option<String>,
    pub whatsapp_phone: Option<String>,
    pub whatsapp_enabled: bool,
    pub email_enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// WhatsApp destination, if the channel is enabled and a phone is on file.
    pub fn whatsapp_destination(&self) -> Option<&str> {
        self.whatsapp_phone
            .as_deref()
            .map(str::trim)
            .filter(|p| self.whatsapp_enabled && !p.is_empty())
    }

    /// Email destination, if the channel is enabled.
    pub fn email_destination(&self) -> Option<&str> {
        Some(self.email.trim()).filter(|e| self.email_enabled && !e.is_empty())
    }
}

/// DTO for creating a user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub full_name: Option<String>,
    pub whatsapp_phone: Option<String>,
    pub whatsapp_enabled: Option<bool>,
    pub email_enabled: Option<bool>,
}
