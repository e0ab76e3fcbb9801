pub mod alerts;
pub mod calendar;
pub mod cases;
pub mod cron;
pub mod health;

use axum::routing::post;
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /cases                             list, create (user)
/// /cases/{id}                        delete
/// /cases/{id}/historical-check       match against stored bulletins (POST)
///
/// /alerts                            list
/// /alerts/unread-count               unread count
/// /alerts/{id}/read                  mark read (POST)
///
/// /calendar/connect                  OAuth code exchange (POST)
/// /calendar/disconnect               stop channels, delete credentials (POST)
/// /calendar/status                   connection state per calendar
/// /calendar/events                   list, create local event
/// /calendar/events/{id}              soft delete
/// /calendar/sync                     inbound sync (POST)
/// /calendar/sync-to-google           outbound push (POST)
/// /calendar/webhook                  provider push notification (public)
///
/// /cron/bulletins                    ingest entries (POST, cron secret)
/// /cron/bulletins/{id}               withdraw entry (DELETE)
/// /cron/check-new-entities           match + notify
/// /cron/dispatch-notifications       notification sweep
/// /cron/calendar-maintenance         refresh, renew, sync all calendars
/// ```
///
/// `timeout` bounds the user-facing routes only. The webhook enforces its
/// own shorter deadline and the `/cron` jobs run to completion.
pub fn api_routes(timeout: TimeoutLayer) -> Router<AppState> {
    Router::new()
        .nest("/cases", cases::router())
        .nest("/alerts", alerts::router())
        .nest("/calendar", calendar::router())
        .layer(timeout)
        .route("/calendar/webhook", post(handlers::calendar::webhook))
        .nest("/cron", cron::router())
}
