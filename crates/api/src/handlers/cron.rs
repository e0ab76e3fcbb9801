//! Handlers for the scheduler endpoints under `/cron`.
//!
//! Every endpoint requires the shared cron secret via [`CronAuth`]. Work is
//! idempotent: a retried run finds nothing new to do. Matching, dispatch
//! and maintenance run on their own task, so a caller that disconnects
//! does not cancel a run between a delivery and its bookkeeping.

use std::future::Future;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use litis_calendar::MaintenanceReport;
use litis_core::error::CoreError;
use litis_core::types::DbId;
use litis_db::models::bulletin::IngestBulletinEntry;
use litis_db::repositories::BulletinEntryRepo;
use litis_events::DispatchReport;
use litis_pipeline::{ingest_entries, run_matching, IngestReport, MatchRunReport};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::cron::CronAuth;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /cron/bulletins`.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub entries: Vec<IngestBulletinEntry>,
}

#[derive(Debug, Serialize)]
pub struct CheckNewEntitiesReport {
    pub matching: MatchRunReport,
    /// `None` when the sweep could not load pending alerts; see
    /// `notification_error`. The next sweep retries.
    pub notifications: Option<DispatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_error: Option<String>,
}

/// Run scheduler work to completion on its own task.
async fn run_detached<T, F>(work: F) -> AppResult<T>
where
    T: Send + 'static,
    F: Future<Output = AppResult<T>> + Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| AppError::InternalError(format!("scheduler task failed: {e}")))?
}

/// POST /api/v1/cron/bulletins
///
/// Store a batch of published bulletin entries. Re-posting the same batch
/// inserts nothing.
pub async fn ingest_bulletins(
    _cron: CronAuth,
    State(state): State<AppState>,
    Json(body): Json<IngestRequest>,
) -> AppResult<Json<DataResponse<IngestReport>>> {
    let report = ingest_entries(&state.pool, body.entries).await?;
    Ok(Json(DataResponse { data: report }))
}

/// DELETE /api/v1/cron/bulletins/{id}
///
/// Withdraw an entry the source retracted. Alerts already created stay.
pub async fn delete_bulletin(
    _cron: CronAuth,
    State(state): State<AppState>,
    Path(entry_id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !BulletinEntryRepo::soft_delete(&state.pool, entry_id).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "BulletinEntry",
            id: entry_id,
        }));
    }
    tracing::info!(entry_id, "Bulletin entry withdrawn");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/cron/check-new-entities
///
/// Match every unprocessed bulletin entry, then run one notification sweep
/// so the new alerts go out in the same run.
pub async fn check_new_entities(
    _cron: CronAuth,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<CheckNewEntitiesReport>>> {
    let report = run_detached(async move {
        let matching = run_matching(
            &state.pool,
            state.config.court_match_policy,
            state.config.match_batch_size,
        )
        .await?;

        let (notifications, notification_error) =
            match state.dispatcher.dispatch_pending(&state.pool).await {
                Ok(report) => (Some(report), None),
                Err(e) => {
                    tracing::error!(error = %e, "Notification sweep after matching failed");
                    (None, Some(e.to_string()))
                }
            };

        Ok::<_, AppError>(CheckNewEntitiesReport {
            matching,
            notifications,
            notification_error,
        })
    })
    .await?;

    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/cron/dispatch-notifications
///
/// Deliver alerts still pending on any channel.
pub async fn dispatch_notifications(
    _cron: CronAuth,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<DispatchReport>>> {
    let report = run_detached(async move {
        Ok::<_, AppError>(state.dispatcher.dispatch_pending(&state.pool).await?)
    })
    .await?;
    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/cron/calendar-maintenance
///
/// Refresh credentials, renew watch channels, and sync every connected
/// calendar. Per-calendar failures are reported, never fatal.
pub async fn calendar_maintenance(
    _cron: CronAuth,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<MaintenanceReport>>> {
    let report = run_detached(async move {
        Ok::<_, AppError>(state.calendar.run_maintenance().await?)
    })
    .await?;
    Ok(Json(DataResponse { data: report }))
}
