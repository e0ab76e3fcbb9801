use std::sync::Arc;

use litis_calendar::CalendarSyncEngine;
use litis_events::NotificationDispatcher;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub pool: litis_db::DbPool,
    pub config: Arc<ServerConfig>,
    pub calendar: Arc<CalendarSyncEngine>,
    pub dispatcher: Arc<NotificationDispatcher>,
}
