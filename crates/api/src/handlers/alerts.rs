//! Handlers for the `/alerts` resource.
//!
//! All endpoints require authentication via [`AuthUser`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use litis_core::error::CoreError;
use litis_core::types::DbId;
use litis_db::models::alert::AlertDetail;
use litis_db::repositories::AlertRepo;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /alerts`.
#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    /// If `true`, return only unread alerts. Defaults to `false`.
    pub unread_only: Option<bool>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

const MAX_LIMIT: i64 = 100;
const DEFAULT_LIMIT: i64 = 50;

/// GET /api/v1/alerts
///
/// The user's alerts, newest first, with the matched bulletin entry.
pub async fn list_alerts(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<AlertQuery>,
) -> AppResult<Json<DataResponse<Vec<AlertDetail>>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);
    let unread_only = params.unread_only.unwrap_or(false);

    let alerts =
        AlertRepo::list_for_user(&state.pool, auth.user_id, unread_only, limit, offset).await?;
    Ok(Json(DataResponse { data: alerts }))
}

/// POST /api/v1/alerts/{id}/read
///
/// Returns 204, or 404 if the alert is not the user's or already read.
pub async fn mark_read(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(alert_id): Path<DbId>,
) -> AppResult<StatusCode> {
    let found = AlertRepo::mark_read(&state.pool, alert_id, auth.user_id).await?;
    if !found {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Alert",
            id: alert_id,
        }));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/alerts/unread-count
pub async fn unread_count(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<serde_json::Value>> {
    let count = AlertRepo::unread_count(&state.pool, auth.user_id).await?;
    Ok(Json(serde_json::json!({
        "data": { "count": count }
    })))
}
