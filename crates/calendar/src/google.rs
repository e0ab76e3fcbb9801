//! Google Calendar API v3 provider.
//!
//! Wire payloads are decoded into private serde structs and converted to the
//! neutral [`provider`](crate::provider) values before leaving this module.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use litis_core::types::Timestamp;
use litis_db::models::calendar::{RemoteChange, RemoteEventData};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::provider::{
    CalendarProvider, ChannelRegistration, EventDraft, EventPage, OAuthTokens, RemoteEventRef,
};

/// HTTP request timeout for a single provider call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Page size requested from the events listing.
const PAGE_SIZE: u32 = 250;

const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Title stored for remote events that have no summary.
const UNTITLED_EVENT: &str = "(Sin título)";

// ---------------------------------------------------------------------------
// GoogleCalendarConfig
// ---------------------------------------------------------------------------

/// OAuth client and endpoint configuration for Google Calendar.
#[derive(Clone)]
pub struct GoogleCalendarConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Redirect URI registered for the OAuth client.
    pub redirect_uri: String,
    /// Public HTTPS address of `POST /api/v1/calendar/webhook`.
    pub webhook_url: String,
    pub api_base: Url,
    pub token_url: Url,
}

impl std::fmt::Debug for GoogleCalendarConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCalendarConfig")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("webhook_url", &self.webhook_url)
            .field("api_base", &self.api_base.as_str())
            .finish_non_exhaustive()
    }
}

impl GoogleCalendarConfig {
    /// Load configuration from environment variables.
    ///
    /// # Panics
    ///
    /// Panics if a required variable is missing or a URL is malformed.
    ///
    /// | Variable                 | Required | Default                                   |
    /// |--------------------------|----------|-------------------------------------------|
    /// | `GOOGLE_CLIENT_ID`       | yes      |                                           |
    /// | `GOOGLE_CLIENT_SECRET`   | yes      |                                           |
    /// | `GOOGLE_REDIRECT_URI`    | yes      |                                           |
    /// | `GOOGLE_WEBHOOK_URL`     | yes      |                                           |
    /// | `GOOGLE_API_BASE`        | no       | `https://www.googleapis.com/calendar/v3`  |
    /// | `GOOGLE_OAUTH_TOKEN_URL` | no       | `https://oauth2.googleapis.com/token`     |
    pub fn from_env() -> Self {
        let client_id =
            std::env::var("GOOGLE_CLIENT_ID").expect("GOOGLE_CLIENT_ID must be set");
        let client_secret =
            std::env::var("GOOGLE_CLIENT_SECRET").expect("GOOGLE_CLIENT_SECRET must be set");
        let redirect_uri =
            std::env::var("GOOGLE_REDIRECT_URI").expect("GOOGLE_REDIRECT_URI must be set");
        let webhook_url =
            std::env::var("GOOGLE_WEBHOOK_URL").expect("GOOGLE_WEBHOOK_URL must be set");

        let api_base = std::env::var("GOOGLE_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let token_url = std::env::var("GOOGLE_OAUTH_TOKEN_URL")
            .unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string());

        Self {
            client_id,
            client_secret,
            redirect_uri,
            webhook_url,
            api_base: Url::parse(&api_base).expect("GOOGLE_API_BASE must be a valid URL"),
            token_url: Url::parse(&token_url).expect("GOOGLE_OAUTH_TOKEN_URL must be a valid URL"),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    id: String,
    #[serde(default)]
    etag: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    start: Option<EventDateTime>,
    #[serde(default)]
    end: Option<EventDateTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    next_sync_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct EventBody<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    start: EventDateTime,
    end: EventDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WatchRequest<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    address: &'a str,
    token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WatchResponse {
    #[serde(default)]
    resource_id: Option<String>,
    /// Milliseconds since the epoch, as a decimal string.
    #[serde(default)]
    expiration: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopRequest<'a> {
    id: &'a str,
    resource_id: &'a str,
}

impl EventDateTime {
    fn resolve(&self) -> Option<(Timestamp, bool)> {
        if let Some(ts) = self.date_time {
            return Some((ts, false));
        }
        let date = self.date?;
        Some((date.and_hms_opt(0, 0, 0)?.and_utc(), true))
    }

    fn from_draft(ts: Timestamp, all_day: bool) -> Self {
        if all_day {
            Self {
                date_time: None,
                date: Some(ts.date_naive()),
            }
        } else {
            Self {
                date_time: Some(ts),
                date: None,
            }
        }
    }
}

impl GoogleEvent {
    /// Convert to a sync delta item. Items without the timing data needed
    /// to store them are reported as [`RemoteChange::Unreadable`].
    fn into_change(self) -> RemoteChange {
        if self.status.as_deref() == Some("cancelled") {
            return RemoteChange::Deleted {
                external_id: self.id,
            };
        }

        let start = self.start.as_ref().and_then(EventDateTime::resolve);
        let end = self.end.as_ref().and_then(EventDateTime::resolve);
        let (Some((start_time, all_day)), Some((end_time, _))) = (start, end) else {
            tracing::warn!(external_id = %self.id, "Remote event without start/end, keeping local copy");
            return RemoteChange::Unreadable {
                external_id: self.id,
            };
        };

        RemoteChange::Upsert(RemoteEventData {
            external_id: self.id,
            etag: self.etag,
            title: self
                .summary
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| UNTITLED_EVENT.to_string()),
            description: self.description,
            location: self.location,
            start_time,
            end_time,
            all_day,
        })
    }
}

impl<'a> From<&'a EventDraft> for EventBody<'a> {
    fn from(draft: &'a EventDraft) -> Self {
        Self {
            summary: &draft.title,
            description: draft.description.as_deref(),
            location: draft.location.as_deref(),
            start: EventDateTime::from_draft(draft.start_time, draft.all_day),
            end: EventDateTime::from_draft(draft.end_time, draft.all_day),
        }
    }
}

fn into_page(response: EventsResponse) -> EventPage {
    EventPage {
        changes: response.items.into_iter().map(GoogleEvent::into_change).collect(),
        next_page_token: response.next_page_token,
        next_sync_token: response.next_sync_token,
    }
}

fn parse_expiration(value: Option<&str>) -> Option<Timestamp> {
    let millis = value?.parse::<i64>().ok()?;
    chrono::DateTime::from_timestamp_millis(millis)
}

/// Map a non-success status to the matching [`ProviderError`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized(body),
        StatusCode::NOT_FOUND => ProviderError::NotFound,
        StatusCode::GONE => ProviderError::Gone,
        StatusCode::PRECONDITION_FAILED => ProviderError::PreconditionFailed,
        StatusCode::BAD_REQUEST if body.contains("invalid_grant") => {
            ProviderError::Unauthorized(body)
        }
        _ => ProviderError::Http {
            status: status.as_u16(),
            body,
        },
    })
}

// ---------------------------------------------------------------------------
// GoogleCalendarClient
// ---------------------------------------------------------------------------

/// [`CalendarProvider`] backed by the Google Calendar REST API.
pub struct GoogleCalendarClient {
    config: GoogleCalendarConfig,
    client: reqwest::Client,
}

impl GoogleCalendarClient {
    pub fn new(config: GoogleCalendarConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { config, client }
    }

    pub fn webhook_url(&self) -> &str {
        &self.config.webhook_url
    }

    /// `{api_base}/<segments...>` with each segment percent-encoded.
    fn api_url(&self, segments: &[&str]) -> Url {
        let mut url = self.config.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn events_url(&self, calendar_id: &str, tail: &[&str]) -> Url {
        let mut segments = vec!["calendars", calendar_id, "events"];
        segments.extend_from_slice(tail);
        self.api_url(&segments)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<OAuthTokens, ProviderError> {
        let response = self
            .client
            .post(self.config.token_url.clone())
            .form(form)
            .send()
            .await?;
        let body: TokenResponse = check_status(response).await?.json().await?;
        Ok(OAuthTokens {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_at: body
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }

    async fn read_event_ref(response: reqwest::Response) -> Result<RemoteEventRef, ProviderError> {
        let event: GoogleEvent = check_status(response).await?.json().await?;
        Ok(RemoteEventRef {
            external_id: event.id,
            etag: event.etag,
        })
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    async fn exchange_code(&self, code: &str) -> Result<OAuthTokens, ProviderError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])
        .await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens, ProviderError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ])
        .await
    }

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        sync_token: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<EventPage, ProviderError> {
        let mut url = self.events_url(calendar_id, &[]);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("maxResults", &PAGE_SIZE.to_string())
                .append_pair("singleEvents", "true")
                .append_pair("showDeleted", "true");
            if let Some(token) = sync_token {
                query.append_pair("syncToken", token);
            }
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let response = self.client.get(url).bearer_auth(access_token).send().await?;
        let body: EventsResponse = check_status(response).await?.json().await?;
        Ok(into_page(body))
    }

    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        draft: &EventDraft,
    ) -> Result<RemoteEventRef, ProviderError> {
        let response = self
            .client
            .post(self.events_url(calendar_id, &[]))
            .bearer_auth(access_token)
            .json(&EventBody::from(draft))
            .send()
            .await?;
        Self::read_event_ref(response).await
    }

    async fn update_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        external_id: &str,
        etag: Option<&str>,
        draft: &EventDraft,
    ) -> Result<RemoteEventRef, ProviderError> {
        let mut request = self
            .client
            .put(self.events_url(calendar_id, &[external_id]))
            .bearer_auth(access_token)
            .json(&EventBody::from(draft));
        if let Some(etag) = etag {
            request = request.header(reqwest::header::IF_MATCH, etag);
        }
        Self::read_event_ref(request.send().await?).await
    }

    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        external_id: &str,
    ) -> Result<(), ProviderError> {
        let response = self
            .client
            .delete(self.events_url(calendar_id, &[external_id]))
            .bearer_auth(access_token)
            .send()
            .await?;
        match check_status(response).await {
            Ok(_) => Ok(()),
            // Already deleted remotely.
            Err(ProviderError::Gone) => Err(ProviderError::NotFound),
            Err(e) => Err(e),
        }
    }

    async fn watch(
        &self,
        access_token: &str,
        calendar_id: &str,
        channel_id: &str,
        verification_token: &str,
    ) -> Result<ChannelRegistration, ProviderError> {
        let request = WatchRequest {
            id: channel_id,
            kind: "web_hook",
            address: &self.config.webhook_url,
            token: verification_token,
        };
        let response = self
            .client
            .post(self.events_url(calendar_id, &["watch"]))
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await?;
        let body: WatchResponse = check_status(response).await?.json().await?;
        Ok(ChannelRegistration {
            expiration: parse_expiration(body.expiration.as_deref()),
            resource_id: body.resource_id,
        })
    }

    async fn stop_channel(
        &self,
        access_token: &str,
        channel_id: &str,
        resource_id: &str,
    ) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(self.api_url(&["channels", "stop"]))
            .bearer_auth(access_token)
            .json(&StopRequest {
                id: channel_id,
                resource_id,
            })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn client() -> GoogleCalendarClient {
        GoogleCalendarClient::new(GoogleCalendarConfig {
            client_id: "client".into(),
            client_secret: "secret".into(),
            redirect_uri: "https://app.example.com/oauth".into(),
            webhook_url: "https://api.example.com/api/v1/calendar/webhook".into(),
            api_base: Url::parse(DEFAULT_API_BASE).unwrap(),
            token_url: Url::parse(DEFAULT_TOKEN_URL).unwrap(),
        })
    }

    #[test]
    fn calendar_ids_are_percent_encoded_in_paths() {
        let url = client().events_url("team@group.calendar.google.com", &["abc"]);
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team@group.calendar.google.com/events/abc"
        );
        let url = client().events_url("a/b", &[]);
        assert!(url.as_str().ends_with("/calendars/a%2Fb/events"));
    }

    #[test]
    fn listing_converts_timed_all_day_and_cancelled_items() {
        let body: EventsResponse = serde_json::from_value(serde_json::json!({
            "items": [
                {
                    "id": "timed",
                    "etag": "\"1\"",
                    "status": "confirmed",
                    "summary": "Audiencia",
                    "start": { "dateTime": "2025-03-10T10:00:00-06:00" },
                    "end": { "dateTime": "2025-03-10T11:00:00-06:00" }
                },
                {
                    "id": "allday",
                    "start": { "date": "2025-03-11" },
                    "end": { "date": "2025-03-12" }
                },
                { "id": "gone", "status": "cancelled" },
                { "id": "broken", "status": "confirmed" }
            ],
            "nextSyncToken": "sync-2"
        }))
        .unwrap();

        let page = into_page(body);
        assert_eq!(page.next_sync_token.as_deref(), Some("sync-2"));
        assert_eq!(page.changes.len(), 4);

        let timed = assert_matches!(&page.changes[0], RemoteChange::Upsert(d) => d);
        assert_eq!(timed.start_time, Utc.with_ymd_and_hms(2025, 3, 10, 16, 0, 0).unwrap());
        assert!(!timed.all_day);
        assert_eq!(timed.etag.as_deref(), Some("\"1\""));

        let all_day = assert_matches!(&page.changes[1], RemoteChange::Upsert(d) => d);
        assert!(all_day.all_day);
        assert_eq!(all_day.title, UNTITLED_EVENT);

        assert_matches!(&page.changes[2], RemoteChange::Deleted { external_id } if external_id == "gone");
        assert_matches!(
            &page.changes[3],
            RemoteChange::Unreadable { external_id } if external_id == "broken"
        );
    }

    #[test]
    fn draft_body_uses_date_for_all_day_events() {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        let draft = EventDraft {
            title: "Vencimiento".into(),
            description: None,
            location: None,
            start_time: start,
            end_time: start + chrono::Duration::days(1),
            all_day: true,
        };
        let value = serde_json::to_value(EventBody::from(&draft)).unwrap();
        assert_eq!(value["start"]["date"], "2025-03-10");
        assert!(value["start"].get("dateTime").is_none());
        assert!(value.get("description").is_none());
    }

    #[test]
    fn watch_expiration_is_parsed_from_millis() {
        let ts = parse_expiration(Some("1741600000000")).unwrap();
        assert_eq!(ts.timestamp(), 1_741_600_000);
        assert_eq!(parse_expiration(Some("soon")), None);
        assert_eq!(parse_expiration(None), None);
    }
}
