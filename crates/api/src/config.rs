use litis_core::matching::CourtMatchPolicy;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// Everything except the secrets has a default suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Largest accepted request body in bytes (default: 8 MiB).
    pub max_body_bytes: usize,
    /// Time allowed for background tasks to stop after the server drains.
    pub shutdown_timeout_secs: u64,
    /// Shared secret expected as a Bearer token on `/cron` endpoints.
    pub cron_secret: String,
    /// How long the webhook waits for its sync before acknowledging anyway.
    /// Always shorter than `request_timeout_secs`.
    pub webhook_sync_timeout_secs: u64,
    /// Interval of the background calendar maintenance loop.
    pub maintenance_interval_secs: u64,
    /// Interval of the background notification sweep.
    pub notification_sweep_interval_secs: u64,
    pub court_match_policy: CourtMatchPolicy,
    /// Bulletin entries matched per batch.
    pub match_batch_size: i64,
    /// Public URL of the web app, linked from notification emails.
    pub app_base_url: Option<String>,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                            | Default                 |
    /// |------------------------------------|-------------------------|
    /// | `HOST`                             | `0.0.0.0`               |
    /// | `PORT`                             | `3000`                  |
    /// | `CORS_ORIGINS`                     | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`             | `30`                    |
    /// | `MAX_BODY_BYTES`                   | `8388608`               |
    /// | `SHUTDOWN_TIMEOUT_SECS`            | `30`                    |
    /// | `CRON_SECRET`                      | **required**            |
    /// | `WEBHOOK_SYNC_TIMEOUT_SECS`        | `8` (below the request timeout) |
    /// | `MAINTENANCE_INTERVAL_SECS`        | `3600`                  |
    /// | `NOTIFICATION_SWEEP_INTERVAL_SECS` | `300`                   |
    /// | `COURT_MATCH_POLICY`               | `normalized`            |
    /// | `MATCH_BATCH_SIZE`                 | `500`                   |
    /// | `APP_BASE_URL`                     | unset                   |
    ///
    /// # Panics
    ///
    /// Panics if a required variable is missing or a value does not parse.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = env_u64("REQUEST_TIMEOUT_SECS", 30);
        let shutdown_timeout_secs = env_u64("SHUTDOWN_TIMEOUT_SECS", 30);

        let cron_secret = std::env::var("CRON_SECRET").expect("CRON_SECRET must be set");
        assert!(!cron_secret.trim().is_empty(), "CRON_SECRET must not be empty");

        let court_match_policy = match std::env::var("COURT_MATCH_POLICY") {
            Ok(v) => CourtMatchPolicy::from_str(&v)
                .expect("COURT_MATCH_POLICY must be one of exact, normalized, ignore"),
            Err(_) => CourtMatchPolicy::default(),
        };

        let match_batch_size: i64 = std::env::var("MATCH_BATCH_SIZE")
            .unwrap_or_else(|_| litis_pipeline::matcher::DEFAULT_MATCH_BATCH.to_string())
            .parse()
            .expect("MATCH_BATCH_SIZE must be a valid i64");

        let app_base_url = std::env::var("APP_BASE_URL")
            .ok()
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_body_bytes: env_u64("MAX_BODY_BYTES", 8 * 1024 * 1024) as usize,
            shutdown_timeout_secs,
            cron_secret,
            webhook_sync_timeout_secs: bounded_webhook_timeout(
                env_u64("WEBHOOK_SYNC_TIMEOUT_SECS", 8),
                request_timeout_secs,
            ),
            maintenance_interval_secs: env_u64("MAINTENANCE_INTERVAL_SECS", 3600),
            notification_sweep_interval_secs: env_u64("NOTIFICATION_SWEEP_INTERVAL_SECS", 300),
            court_match_policy,
            match_batch_size: match_batch_size.max(1),
            app_base_url,
            jwt: JwtConfig::from_env(),
        }
    }
}

/// Clamp the webhook wait to at least one second and below the request
/// timeout.
pub fn bounded_webhook_timeout(configured: u64, request_timeout_secs: u64) -> u64 {
    let ceiling = request_timeout_secs.saturating_sub(1).max(1);
    if configured > ceiling {
        tracing::warn!(
            configured,
            ceiling,
            "WEBHOOK_SYNC_TIMEOUT_SECS exceeds the request timeout, clamping"
        );
    }
    configured.clamp(1, ceiling)
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid u64")),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_timeout_stays_below_request_timeout() {
        assert_eq!(bounded_webhook_timeout(8, 30), 8);
        assert_eq!(bounded_webhook_timeout(60, 30), 29);
        assert_eq!(bounded_webhook_timeout(0, 30), 1);
        assert_eq!(bounded_webhook_timeout(5, 1), 1);
    }
}
