//! Calendar provider boundary.
//!
//! The engine only sees the typed values below; provider JSON is decoded
//! and validated inside the provider implementation.

use async_trait::async_trait;
use litis_core::types::Timestamp;
use litis_db::models::calendar::{CalendarEvent, RemoteChange};

use crate::error::ProviderError;

/// OAuth2 credentials returned by a code exchange or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthTokens {
    pub access_token: String,
    /// Only present on first consent and on some refreshes.
    pub refresh_token: Option<String>,
    pub expires_at: Option<Timestamp>,
}

/// One page of an event listing.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub changes: Vec<RemoteChange>,
    pub next_page_token: Option<String>,
    /// Present on the last page only.
    pub next_sync_token: Option<String>,
}

/// Identity and version of a remote event after a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEventRef {
    pub external_id: String,
    pub etag: Option<String>,
}

/// Event fields sent to the provider on create/update.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub all_day: bool,
}

impl From<&CalendarEvent> for EventDraft {
    fn from(event: &CalendarEvent) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start_time: event.start_time,
            end_time: event.end_time,
            all_day: event.all_day,
        }
    }
}

/// A push subscription registered with the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRegistration {
    pub resource_id: Option<String>,
    pub expiration: Option<Timestamp>,
}

/// Operations the sync engine needs from an external calendar.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Exchange an OAuth authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<OAuthTokens, ProviderError>;

    /// Obtain a fresh access token.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens, ProviderError>;

    /// List events. With `sync_token`, only changes since that token are
    /// returned; an expired token yields [`ProviderError::Gone`].
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        sync_token: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<EventPage, ProviderError>;

    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        draft: &EventDraft,
    ) -> Result<RemoteEventRef, ProviderError>;

    /// Update an event. With `etag`, the write only succeeds if the remote
    /// event still has that version ([`ProviderError::PreconditionFailed`]
    /// otherwise).
    async fn update_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        external_id: &str,
        etag: Option<&str>,
        draft: &EventDraft,
    ) -> Result<RemoteEventRef, ProviderError>;

    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        external_id: &str,
    ) -> Result<(), ProviderError>;

    /// Register a push-notification channel for a calendar's events.
    async fn watch(
        &self,
        access_token: &str,
        calendar_id: &str,
        channel_id: &str,
        verification_token: &str,
    ) -> Result<ChannelRegistration, ProviderError>;

    /// Stop a push-notification channel.
    async fn stop_channel(
        &self,
        access_token: &str,
        channel_id: &str,
        resource_id: &str,
    ) -> Result<(), ProviderError>;
}
