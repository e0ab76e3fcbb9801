//! Shared-secret authorization for scheduler endpoints.
//!
//! `/cron` routes run without a user session. The scheduler sends
//! `Authorization: Bearer <CRON_SECRET>`; the secret is compared by SHA-256
//! digest so the comparison does not depend on where the strings differ.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use litis_core::error::CoreError;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::middleware::auth::bearer_token;
use crate::state::AppState;

/// Marker extractor: the request carried the configured cron secret.
#[derive(Debug, Clone, Copy)]
pub struct CronAuth;

impl FromRequestParts<AppState> for CronAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        if !secret_matches(token, &state.config.cron_secret) {
            tracing::warn!(path = %parts.uri.path(), "Rejected cron request with invalid secret");
            return Err(AppError::Core(CoreError::Unauthorized(
                "Invalid cron secret".into(),
            )));
        }
        Ok(CronAuth)
    }
}

fn digest(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Equal-length digests compared without early exit.
fn secret_matches(provided: &str, expected: &str) -> bool {
    let (a, b) = (digest(provided), digest(expected));
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
