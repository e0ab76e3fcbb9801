//! Shared helpers for API integration tests: a test app wired with
//! in-memory calendar and notification providers, request helpers, and
//! seed data.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use litis_api::auth::jwt::{generate_access_token, JwtConfig};
use litis_api::config::ServerConfig;
use litis_api::router::build_app_router;
use litis_api::state::AppState;
use litis_calendar::provider::{
    CalendarProvider, ChannelRegistration, EventDraft, EventPage, OAuthTokens, RemoteEventRef,
};
use litis_calendar::{CalendarSyncEngine, ProviderError};
use litis_core::bulletin_message::BatchMessage;
use litis_core::delivery::Channel;
use litis_core::matching::CourtMatchPolicy;
use litis_core::retry::RetryPolicy;
use litis_core::types::DbId;
use litis_db::models::user::CreateUser;
use litis_db::repositories::UserRepo;
use litis_events::{DeliveryError, NotificationChannel, NotificationDispatcher};
use sqlx::PgPool;
use tower::ServiceExt;

pub const CRON_SECRET: &str = "test-cron-secret";

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_body_bytes: 64 * 1024,
        shutdown_timeout_secs: 5,
        cron_secret: CRON_SECRET.to_string(),
        webhook_sync_timeout_secs: 5,
        maintenance_interval_secs: 3600,
        notification_sweep_interval_secs: 300,
        court_match_policy: CourtMatchPolicy::Normalized,
        match_batch_size: 100,
        app_base_url: Some("https://app.litis.test".to_string()),
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Calendar provider with an always-empty remote calendar.
#[derive(Debug, Default)]
pub struct FakeCalendar {
    pub watched: Mutex<Vec<String>>,
    pub stopped: Mutex<Vec<String>>,
    /// Delay applied to every event listing.
    pub list_delay_ms: AtomicU64,
}

#[async_trait]
impl CalendarProvider for FakeCalendar {
    async fn exchange_code(&self, code: &str) -> Result<OAuthTokens, ProviderError> {
        if code == "bad-code" {
            return Err(ProviderError::Unauthorized("invalid_grant".into()));
        }
        Ok(OAuthTokens {
            access_token: format!("access-{code}"),
            refresh_token: Some("refresh".into()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        })
    }

    async fn refresh_access_token(&self, _refresh: &str) -> Result<OAuthTokens, ProviderError> {
        Ok(OAuthTokens {
            access_token: "access-refreshed".into(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
        })
    }

    async fn list_events(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        _sync_token: Option<&str>,
        _page_token: Option<&str>,
    ) -> Result<EventPage, ProviderError> {
        pause(&self.list_delay_ms).await;
        Ok(EventPage {
            changes: Vec::new(),
            next_page_token: None,
            next_sync_token: Some("sync-1".into()),
        })
    }

    async fn insert_event(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        draft: &EventDraft,
    ) -> Result<RemoteEventRef, ProviderError> {
        Ok(RemoteEventRef {
            external_id: format!("remote-{}", draft.title.len()),
            etag: Some("\"1\"".into()),
        })
    }

    async fn update_event(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        external_id: &str,
        _etag: Option<&str>,
        _draft: &EventDraft,
    ) -> Result<RemoteEventRef, ProviderError> {
        Ok(RemoteEventRef {
            external_id: external_id.to_string(),
            etag: Some("\"2\"".into()),
        })
    }

    async fn delete_event(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        _external_id: &str,
    ) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn watch(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        channel_id: &str,
        _verification_token: &str,
    ) -> Result<ChannelRegistration, ProviderError> {
        self.watched.lock().unwrap().push(channel_id.to_string());
        Ok(ChannelRegistration {
            resource_id: Some("res-primary".into()),
            expiration: Some(Utc::now() + Duration::days(7)),
        })
    }

    async fn stop_channel(
        &self,
        _access_token: &str,
        channel_id: &str,
        _resource_id: &str,
    ) -> Result<(), ProviderError> {
        self.stopped.lock().unwrap().push(channel_id.to_string());
        Ok(())
    }
}

async fn pause(delay_ms: &AtomicU64) {
    let ms = delay_ms.load(Ordering::SeqCst);
    if ms > 0 {
        tokio::time::sleep(StdDuration::from_millis(ms)).await;
    }
}

/// Notification channel recording every message it is asked to send.
pub struct RecordingChannel {
    channel: Channel,
    pub sent: Mutex<Vec<(String, BatchMessage)>>,
    /// Delay applied to every send.
    pub delay_ms: AtomicU64,
}

impl RecordingChannel {
    pub fn new(channel: Channel) -> Arc<Self> {
        Arc::new(Self {
            channel,
            sent: Mutex::new(Vec::new()),
            delay_ms: AtomicU64::new(0),
        })
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send_batch(
        &self,
        destination: &str,
        message: &BatchMessage,
    ) -> Result<String, DeliveryError> {
        pause(&self.delay_ms).await;
        let mut sent = self.sent.lock().unwrap();
        sent.push((destination.to_string(), message.clone()));
        Ok(format!("{}-{}", self.channel, sent.len()))
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    pub calendar: Arc<FakeCalendar>,
    pub whatsapp: Arc<RecordingChannel>,
    pub email: Arc<RecordingChannel>,
}

/// Build the full application router, with fakes behind every provider.
pub fn build_test_app(pool: PgPool) -> TestApp {
    build_test_app_with(pool, test_config())
}

pub fn build_test_app_with(pool: PgPool, config: ServerConfig) -> TestApp {
    let calendar = Arc::new(FakeCalendar::default());
    let whatsapp = RecordingChannel::new(Channel::WhatsApp);
    let email = RecordingChannel::new(Channel::Email);

    let dispatcher = NotificationDispatcher::new(RetryPolicy::immediate(1))
        .with_whatsapp(whatsapp.clone())
        .with_email(email.clone())
        .with_app_url(config.app_base_url.clone());

    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        calendar: Arc::new(CalendarSyncEngine::new(pool.clone(), calendar.clone())),
        dispatcher: Arc::new(dispatcher),
    };

    TestApp {
        router: build_app_router(state, &config),
        pool,
        calendar,
        whatsapp,
        email,
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub fn bearer_for(user_id: DbId) -> String {
    let token = generate_access_token(user_id, &test_config().jwt).unwrap();
    format!("Bearer {token}")
}

pub fn cron_bearer() -> String {
    format!("Bearer {CRON_SECRET}")
}

/// Send a request with an optional `Authorization` header and JSON body.
pub async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    authorization: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = authorization {
        builder = builder.header("authorization", auth);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn expect_status(response: Response<Body>, status: StatusCode) -> serde_json::Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}

// ---------------------------------------------------------------------------
// Seed data
// ---------------------------------------------------------------------------

pub async fn seed_user(pool: &PgPool, email: &str) -> DbId {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            full_name: Some("Ana Torres".into()),
            whatsapp_phone: Some("+5215512345678".into()),
            whatsapp_enabled: Some(true),
            email_enabled: Some(true),
        },
    )
    .await
    .unwrap()
    .id
}

/// One bulletin entry in the ingestion payload format.
pub fn bulletin_entry(date: &str, court: &str, case_number: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "bulletin_date": date,
        "court_name": court,
        "case_number": case_number,
        "raw_text": text,
        "source_url": "https://boletin.example/2025-03-10",
        "source": "tsj-cdmx",
    })
}
