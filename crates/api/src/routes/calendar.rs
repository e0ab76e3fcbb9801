//! Route definitions for the `/calendar` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::calendar;
use crate::state::AppState;

/// Routes mounted at `/calendar`.
///
/// ```text
/// POST   /connect          -> connect
/// POST   /disconnect       -> disconnect
/// GET    /status           -> status
/// GET    /events           -> list_events
/// POST   /events           -> create_event
/// DELETE /events/{id}      -> delete_event
/// POST   /sync             -> sync
/// POST   /sync-to-google   -> sync_to_google
/// ```
///
/// The provider webhook is mounted by [`super::api_routes`], outside the
/// request timeout.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/connect", post(calendar::connect))
        .route("/disconnect", post(calendar::disconnect))
        .route("/status", get(calendar::status))
        .route(
            "/events",
            get(calendar::list_events).post(calendar::create_event),
        )
        .route("/events/{id}", delete(calendar::delete_event))
        .route("/sync", post(calendar::sync))
        .route("/sync-to-google", post(calendar::sync_to_google))
}
