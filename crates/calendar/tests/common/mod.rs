//! In-memory calendar provider and seed helpers for engine tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use litis_calendar::provider::{
    CalendarProvider, ChannelRegistration, EventDraft, EventPage, OAuthTokens, RemoteEventRef,
};
use litis_calendar::{CalendarSyncEngine, ProviderError};
use litis_db::models::calendar::{RemoteChange, RemoteEventData};
use litis_db::models::user::{CreateUser, User};
use litis_db::repositories::UserRepo;
use sqlx::PgPool;

pub const RESOURCE_ID: &str = "res-primary";

#[derive(Debug, Default)]
pub struct FakeState {
    /// Remote events by external id.
    pub events: BTreeMap<String, RemoteEventData>,
    /// External ids deleted remotely, reported in the next delta.
    pub tombstones: Vec<String>,
    /// Reject every incremental listing with 410.
    pub sync_token_gone: bool,
    /// Fail every listing with a 503.
    pub fail_list: bool,
    /// Split listings into pages of this size.
    pub page_size: Option<usize>,
    /// `sync_token` argument of every listing call.
    pub listed_with: Vec<Option<String>>,
    /// Reject every channel registration with a 503.
    pub fail_watch: bool,
    pub watched: Vec<String>,
    pub stopped: Vec<(String, String)>,
    pub deleted: Vec<String>,
    counter: u32,
}

#[derive(Debug, Default)]
pub struct FakeProvider {
    pub state: Mutex<FakeState>,
}

impl FakeProvider {
    pub fn with_events(ids: &[&str]) -> Arc<Self> {
        let fake = Arc::new(Self::default());
        for id in ids {
            fake.put_remote(id, "\"1\"", &format!("Audiencia {id}"));
        }
        fake
    }

    pub fn put_remote(&self, id: &str, etag: &str, title: &str) {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 16, 0, 0).unwrap();
        self.state.lock().unwrap().events.insert(
            id.to_string(),
            RemoteEventData {
                external_id: id.to_string(),
                etag: Some(etag.to_string()),
                title: title.to_string(),
                description: None,
                location: None,
                start_time: start,
                end_time: start + Duration::hours(1),
                all_day: false,
            },
        );
    }

    pub fn remove_remote(&self, id: &str, with_tombstone: bool) {
        let mut state = self.state.lock().unwrap();
        state.events.remove(id);
        if with_tombstone {
            state.tombstones.push(id.to_string());
        }
    }

    pub fn engine(self: &Arc<Self>, pool: &PgPool) -> CalendarSyncEngine {
        CalendarSyncEngine::new(pool.clone(), self.clone())
    }
}

#[async_trait]
impl CalendarProvider for FakeProvider {
    async fn exchange_code(&self, code: &str) -> Result<OAuthTokens, ProviderError> {
        if code == "bad-code" {
            return Err(ProviderError::Unauthorized("invalid_grant".into()));
        }
        Ok(OAuthTokens {
            access_token: format!("at-{code}"),
            refresh_token: Some(format!("rt-{code}")),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens, ProviderError> {
        if refresh_token == "revoked" {
            return Err(ProviderError::Unauthorized("invalid_grant".into()));
        }
        Ok(OAuthTokens {
            access_token: "at-refreshed".into(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
        })
    }

    async fn list_events(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        sync_token: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<EventPage, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.listed_with.push(sync_token.map(str::to_string));
        if state.fail_list {
            return Err(ProviderError::Http {
                status: 503,
                body: "backend error".into(),
            });
        }
        if sync_token.is_some() && state.sync_token_gone {
            return Err(ProviderError::Gone);
        }

        let mut all: Vec<RemoteChange> =
            state.events.values().cloned().map(RemoteChange::Upsert).collect();
        if sync_token.is_some() {
            all.extend(state.tombstones.iter().map(|id| RemoteChange::Deleted {
                external_id: id.clone(),
            }));
        }

        let size = state.page_size.unwrap_or(usize::MAX).max(1);
        let start: usize = page_token.and_then(|p| p.parse().ok()).unwrap_or(0);
        let end = start.saturating_add(size).min(all.len());
        let changes = all[start.min(all.len())..end].to_vec();

        if end < all.len() {
            return Ok(EventPage {
                changes,
                next_page_token: Some(end.to_string()),
                next_sync_token: None,
            });
        }
        state.counter += 1;
        state.tombstones.clear();
        Ok(EventPage {
            changes,
            next_page_token: None,
            next_sync_token: Some(format!("sync-{}", state.counter)),
        })
    }

    async fn insert_event(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        draft: &EventDraft,
    ) -> Result<RemoteEventRef, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.counter += 1;
        let id = format!("ext-{}", state.counter);
        state.events.insert(
            id.clone(),
            RemoteEventData {
                external_id: id.clone(),
                etag: Some("\"1\"".into()),
                title: draft.title.clone(),
                description: draft.description.clone(),
                location: draft.location.clone(),
                start_time: draft.start_time,
                end_time: draft.end_time,
                all_day: draft.all_day,
            },
        );
        Ok(RemoteEventRef {
            external_id: id,
            etag: Some("\"1\"".into()),
        })
    }

    async fn update_event(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        external_id: &str,
        etag: Option<&str>,
        draft: &EventDraft,
    ) -> Result<RemoteEventRef, ProviderError> {
        let mut state = self.state.lock().unwrap();
        let event = state.events.get_mut(external_id).ok_or(ProviderError::NotFound)?;
        if etag.is_some() && event.etag.as_deref() != etag {
            return Err(ProviderError::PreconditionFailed);
        }
        event.title = draft.title.clone();
        event.etag = Some("\"2\"".into());
        Ok(RemoteEventRef {
            external_id: external_id.to_string(),
            etag: event.etag.clone(),
        })
    }

    async fn delete_event(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        external_id: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.deleted.push(external_id.to_string());
        state
            .events
            .remove(external_id)
            .map(|_| ())
            .ok_or(ProviderError::NotFound)
    }

    async fn watch(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        channel_id: &str,
        _verification_token: &str,
    ) -> Result<ChannelRegistration, ProviderError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_watch {
            return Err(ProviderError::Http {
                status: 503,
                body: "unavailable".into(),
            });
        }
        state.watched.push(channel_id.to_string());
        Ok(ChannelRegistration {
            resource_id: Some(RESOURCE_ID.to_string()),
            expiration: Some(Utc::now() + Duration::days(7)),
        })
    }

    async fn stop_channel(
        &self,
        _access_token: &str,
        channel_id: &str,
        resource_id: &str,
    ) -> Result<(), ProviderError> {
        self.state
            .lock()
            .unwrap()
            .stopped
            .push((channel_id.to_string(), resource_id.to_string()));
        Ok(())
    }
}

pub async fn seed_user(pool: &PgPool, email: &str) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            full_name: Some("Ana Pérez".to_string()),
            whatsapp_phone: None,
            whatsapp_enabled: None,
            email_enabled: None,
        },
    )
    .await
    .unwrap()
}
