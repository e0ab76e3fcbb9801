use litis_core::error::CoreError;

/// Errors that abort a whole pipeline run.
///
/// Per-entry problems are counted in the run reports instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
