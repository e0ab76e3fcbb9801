use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use litis_calendar::{CalendarProvider, CalendarSyncEngine, GoogleCalendarClient, GoogleCalendarConfig};
use litis_core::retry::RetryPolicy;
use litis_events::{
    EmailConfig, EmailDelivery, NotificationDispatcher, NotificationSweeper, WhatsAppConfig,
    WhatsAppDelivery,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use litis_api::background;
use litis_api::config::ServerConfig;
use litis_api::router::build_app_router;
use litis_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "litis_api=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        court_match_policy = config.court_match_policy.as_str(),
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = litis_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    litis_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    litis_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Notification channels ---
    let mut dispatcher = NotificationDispatcher::new(RetryPolicy::from_env())
        .with_app_url(config.app_base_url.clone());
    match WhatsAppConfig::from_env() {
        Some(wa) => dispatcher = dispatcher.with_whatsapp(Arc::new(WhatsAppDelivery::new(wa))),
        None => tracing::warn!("WhatsApp not configured, channel disabled"),
    }
    match EmailConfig::from_env() {
        Some(email) => {
            let delivery = EmailDelivery::new(email).expect("Failed to configure SMTP transport");
            dispatcher = dispatcher.with_email(Arc::new(delivery));
        }
        None => tracing::warn!("SMTP not configured, email channel disabled"),
    }
    let dispatcher = Arc::new(dispatcher);

    // --- Calendar ---
    let provider: Arc<dyn CalendarProvider> =
        Arc::new(GoogleCalendarClient::new(GoogleCalendarConfig::from_env()));
    let calendar = Arc::new(CalendarSyncEngine::new(pool.clone(), provider));

    // --- Background jobs ---
    let cancel = CancellationToken::new();

    let sweeper = NotificationSweeper::new(
        pool.clone(),
        Arc::clone(&dispatcher),
        Duration::from_secs(config.notification_sweep_interval_secs),
    );
    let sweep_cancel = cancel.clone();
    let sweep_handle = tokio::spawn(async move { sweeper.run(sweep_cancel).await });

    let maintenance_handle = tokio::spawn(background::calendar_maintenance::run(
        Arc::clone(&calendar),
        Duration::from_secs(config.maintenance_interval_secs),
        cancel.clone(),
    ));
    tracing::info!("Background jobs started (notification sweep, calendar maintenance)");

    // --- App ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        calendar,
        dispatcher,
    };
    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, stopping background jobs");
    cancel.cancel();
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    let _ = tokio::time::timeout(grace, sweep_handle).await;
    let _ = tokio::time::timeout(grace, maintenance_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
