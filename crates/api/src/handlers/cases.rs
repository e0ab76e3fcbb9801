//! Handlers for the `/cases` resource.
//!
//! All endpoints require authentication via [`AuthUser`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use litis_core::case_number::validate_case_number;
use litis_core::error::CoreError;
use litis_core::matching::validate_party_name;
use litis_core::types::DbId;
use litis_db::models::monitored_case::{CreateMonitoredCase, MonitoredCase};
use litis_db::repositories::MonitoredCaseRepo;
use litis_pipeline::{check_historical_matches, HistoricalCheckReport};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /cases`.
#[derive(Debug, Deserialize)]
pub struct CreateCaseRequest {
    pub case_number: Option<String>,
    pub court_name: Option<String>,
    pub party_name: Option<String>,
    /// Match the new case against already stored bulletins right away.
    #[serde(default)]
    pub check_history: bool,
}

#[derive(Debug, Serialize)]
pub struct CreatedCase {
    #[serde(flatten)]
    pub case: MonitoredCase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical: Option<HistoricalCheckReport>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// POST /api/v1/cases
///
/// A case needs a case number or a party name. The case number is
/// validated and keyed here so malformed numbers never reach the matcher.
pub async fn create_case(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateCaseRequest>,
) -> AppResult<impl IntoResponse> {
    let input = CreateMonitoredCase {
        case_number: non_blank(body.case_number),
        court_name: non_blank(body.court_name),
        party_name: non_blank(body.party_name),
    };

    let case_key = match input.case_number.as_deref() {
        Some(number) => Some(validate_case_number(number)?.to_string()),
        None => None,
    };
    match input.party_name.as_deref() {
        Some(name) => {
            validate_party_name(name)?;
        }
        None if case_key.is_none() => {
            return Err(AppError::Core(CoreError::Validation(
                "case_number or party_name is required".into(),
            )));
        }
        None => {}
    }

    let case =
        MonitoredCaseRepo::create(&state.pool, auth.user_id, &input, case_key.as_deref()).await?;
    tracing::info!(user_id = auth.user_id, case_id = case.id, "Monitored case created");

    let historical = if body.check_history {
        Some(
            check_historical_matches(
                &state.pool,
                auth.user_id,
                case.id,
                state.config.court_match_policy,
            )
            .await?,
        )
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedCase { case, historical },
        }),
    ))
}

/// GET /api/v1/cases
pub async fn list_cases(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<MonitoredCase>>>> {
    let cases = MonitoredCaseRepo::list_for_user(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: cases }))
}

/// DELETE /api/v1/cases/{id}
///
/// Stops monitoring the case; its alerts are removed with it.
pub async fn delete_case(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(case_id): Path<DbId>,
) -> AppResult<StatusCode> {
    let deleted = MonitoredCaseRepo::delete(&state.pool, case_id, auth.user_id).await?;
    if !deleted {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "MonitoredCase",
            id: case_id,
        }));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/cases/{id}/historical-check
///
/// Match an existing case against every stored bulletin entry. Found
/// matches become alerts; delivery happens in the next notification sweep.
pub async fn historical_check(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(case_id): Path<DbId>,
) -> AppResult<Json<DataResponse<HistoricalCheckReport>>> {
    let report = check_historical_matches(
        &state.pool,
        auth.user_id,
        case_id,
        state.config.court_match_policy,
    )
    .await?;
    Ok(Json(DataResponse { data: report }))
}
