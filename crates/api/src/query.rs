//! Shared query parameter types for API handlers.

use litis_db::models::calendar::DEFAULT_CALENDAR_ID;
use serde::Deserialize;

/// Selects one of the user's connected calendars (`?calendar_id=`).
///
/// Omitted means the provider's primary calendar.
#[derive(Debug, Default, Deserialize)]
pub struct CalendarParams {
    pub calendar_id: Option<String>,
}

impl CalendarParams {
    pub fn calendar_id(&self) -> &str {
        self.calendar_id
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CALENDAR_ID)
    }
}
