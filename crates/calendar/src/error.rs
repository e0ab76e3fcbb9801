use litis_core::error::CoreError;
use litis_core::types::DbId;

/// Failure talking to the calendar provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP 410. For event listing this means the sync token expired.
    #[error("Resource gone (sync token invalidated)")]
    Gone,

    #[error("Resource not found")]
    NotFound,

    /// HTTP 412: the etag sent with `If-Match` no longer matches.
    #[error("Precondition failed: remote event changed")]
    PreconditionFailed,

    /// HTTP 401/403 or an OAuth `invalid_grant`.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Failure of a calendar engine operation.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Calendar '{calendar_id}' is not connected for user {user_id}")]
    NotConnected { user_id: DbId, calendar_id: String },
}
