use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::cases;
use crate::state::AppState;

/// Routes mounted at `/cases`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cases::list_cases).post(cases::create_case))
        .route("/{id}", delete(cases::delete_case))
        .route("/{id}/historical-check", post(cases::historical_check))
}
