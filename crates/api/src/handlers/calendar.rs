//! Handlers for the `/calendar` resource.
//!
//! Everything except the push webhook requires authentication via
//! [`AuthUser`]. The webhook is authenticated by its channel verification
//! token and always answers 200.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use litis_calendar::{
    ConnectReport, ConnectionStatus, PushReport, SyncReport, WebhookNotification,
};
use litis_core::error::CoreError;
use litis_core::types::DbId;
use litis_db::models::calendar::{CalendarEvent, CreateCalendarEvent, DEFAULT_CALENDAR_ID};
use litis_db::repositories::CalendarEventRepo;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::CalendarParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Body of `POST /calendar/connect`.
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    /// OAuth authorization code from the consent redirect.
    pub code: String,
    pub calendar_id: Option<String>,
}

/// POST /api/v1/calendar/connect
pub async fn connect(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<ConnectRequest>,
) -> AppResult<Json<DataResponse<ConnectReport>>> {
    let code = body.code.trim();
    if code.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "code must not be empty".into(),
        )));
    }
    let params = CalendarParams {
        calendar_id: body.calendar_id,
    };
    let report = state
        .calendar
        .connect(auth.user_id, params.calendar_id(), code)
        .await?;
    Ok(Json(DataResponse { data: report }))
}

/// POST /api/v1/calendar/disconnect?calendar_id=
pub async fn disconnect(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<CalendarParams>,
) -> AppResult<Json<serde_json::Value>> {
    let disconnected = state
        .calendar
        .disconnect(auth.user_id, params.calendar_id())
        .await?;
    Ok(Json(json!({ "data": { "disconnected": disconnected } })))
}

/// GET /api/v1/calendar/status
pub async fn status(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<ConnectionStatus>>>> {
    let statuses = state.calendar.status(auth.user_id).await?;
    Ok(Json(DataResponse { data: statuses }))
}

// ---------------------------------------------------------------------------
// Local events
// ---------------------------------------------------------------------------

/// POST /api/v1/calendar/events
///
/// The event is stored as pending and pushed by the next outbound sync.
pub async fn create_event(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateCalendarEvent>,
) -> AppResult<impl IntoResponse> {
    if input.title.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "title must not be empty".into(),
        )));
    }
    if input.end_time < input.start_time {
        return Err(AppError::Core(CoreError::Validation(
            "end_time must not be before start_time".into(),
        )));
    }
    let calendar_id = input
        .calendar_id
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CALENDAR_ID)
        .to_string();

    let event =
        CalendarEventRepo::create_local(&state.pool, auth.user_id, &calendar_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: event })))
}

/// GET /api/v1/calendar/events
pub async fn list_events(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<CalendarEvent>>>> {
    let events = CalendarEventRepo::list_for_user(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: events }))
}

/// DELETE /api/v1/calendar/events/{id}
///
/// Soft delete; the removal is pushed by the next outbound sync.
pub async fn delete_event(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !CalendarEventRepo::soft_delete(&state.pool, event_id, auth.user_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "CalendarEvent",
            id: event_id,
        }));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Manual sync
// ---------------------------------------------------------------------------

/// POST /api/v1/calendar/sync?calendar_id=
///
/// Provider failures are reported in the body with `success: false`.
pub async fn sync(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<CalendarParams>,
) -> AppResult<Json<DataResponse<SyncReport>>> {
    let report = state
        .calendar
        .sync_inbound(auth.user_id, params.calendar_id())
        .await?;
    Ok(Json(DataResponse { data: report }))
}

/// POST /api/v1/calendar/sync-to-google?calendar_id=
pub async fn sync_to_google(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<CalendarParams>,
) -> AppResult<Json<DataResponse<PushReport>>> {
    let report = state
        .calendar
        .push_pending(auth.user_id, params.calendar_id())
        .await?;
    Ok(Json(DataResponse { data: report }))
}

// ---------------------------------------------------------------------------
// Push webhook
// ---------------------------------------------------------------------------

fn acknowledged(status: &str) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "data": { "outcome": status } })))
}

/// POST /api/v1/calendar/webhook
///
/// The provider retries non-2xx answers and gives up on slow ones, so this
/// always answers 200. The triggered sync runs in its own task; if it does
/// not finish within `webhook_sync_timeout_secs` the request is acknowledged
/// and the task keeps running. Missed work is picked up by maintenance.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(notification) =
        WebhookNotification::from_headers(|name| headers.get(name).and_then(|v| v.to_str().ok()))
    else {
        tracing::warn!("Calendar webhook without channel headers");
        return acknowledged("ignored");
    };

    let channel_id = notification.channel_id.clone();
    let engine = Arc::clone(&state.calendar);
    let task = tokio::spawn(async move { engine.handle_webhook(&notification).await });
    let timeout = Duration::from_secs(state.config.webhook_sync_timeout_secs);

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(outcome))) => (StatusCode::OK, Json(json!({ "data": outcome }))),
        Ok(Ok(Err(e))) => {
            tracing::error!(%channel_id, error = %e, "Calendar webhook processing failed");
            acknowledged("error")
        }
        Ok(Err(e)) => {
            tracing::error!(%channel_id, error = %e, "Calendar webhook task aborted");
            acknowledged("error")
        }
        Err(_) => {
            tracing::warn!(
                %channel_id,
                timeout_secs = timeout.as_secs(),
                "Calendar webhook sync still running, acknowledging"
            );
            acknowledged("accepted")
        }
    }
}
