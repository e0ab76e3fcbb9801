//! Route definitions for the scheduler endpoints.
//!
//! All endpoints require the shared cron secret.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::cron;
use crate::state::AppState;

/// Routes mounted at `/cron`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bulletins", post(cron::ingest_bulletins))
        .route("/bulletins/{id}", delete(cron::delete_bulletin))
        .route("/check-new-entities", get(cron::check_new_entities))
        .route("/dispatch-notifications", get(cron::dispatch_notifications))
        .route("/calendar-maintenance", get(cron::calendar_maintenance))
}
