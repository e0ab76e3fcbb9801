//! Watch channel lifecycle: registration, stop, and renewal.
//!
//! At most one channel per (user, calendar) is live. Creating a channel
//! stops the previous ones first, remotely and locally. The new channel is
//! recorded as pending before the provider is asked to register it, so a
//! notification arriving during registration is not taken for an orphan.

use chrono::Utc;
use litis_core::calendar_state::channel_needs_renewal;
use litis_core::error::CoreError;
use litis_db::models::calendar::{CalendarToken, NewWatchChannel, WatchChannel};
use litis_db::repositories::WatchChannelRepo;
use rand::Rng;

use crate::error::{CalendarError, ProviderError};
use crate::sync::CalendarSyncEngine;

/// Length of the per-channel verification token echoed back by the provider.
const VERIFICATION_TOKEN_LENGTH: usize = 32;

fn generate_verification_token() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(VERIFICATION_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

impl CalendarSyncEngine {
    /// Register a new push channel for `token`'s calendar and record it.
    ///
    /// Previously live channels of the same calendar are stopped first. If
    /// registration fails the pending row is marked stopped.
    pub async fn create_watch_channel(
        &self,
        token: &CalendarToken,
    ) -> Result<WatchChannel, CalendarError> {
        let access_token = self.ensure_fresh_token(token).await?;

        for existing in
            WatchChannelRepo::list_active_for(&self.pool, token.user_id, &token.calendar_id).await?
        {
            self.stop_channel_with(&access_token, &existing).await?;
        }

        let pending = WatchChannelRepo::create_pending(
            &self.pool,
            &NewWatchChannel {
                user_id: token.user_id,
                calendar_id: token.calendar_id.clone(),
                channel_id: uuid::Uuid::new_v4().to_string(),
                verification_token: generate_verification_token(),
                resource_id: None,
                expiration: None,
            },
        )
        .await?;

        let registration = match self
            .provider
            .watch(
                &access_token,
                &token.calendar_id,
                &pending.channel_id,
                &pending.verification_token,
            )
            .await
        {
            Ok(r) => r,
            Err(e) => {
                WatchChannelRepo::mark_stopped(&self.pool, pending.id).await?;
                return Err(e.into());
            }
        };

        let channel = WatchChannelRepo::activate(
            &self.pool,
            pending.id,
            registration.resource_id.as_deref(),
            registration.expiration,
        )
        .await?
        .ok_or_else(|| {
            CalendarError::Core(CoreError::Conflict(format!(
                "watch channel {} was stopped during registration",
                pending.channel_id
            )))
        })?;

        tracing::info!(
            user_id = token.user_id,
            calendar_id = %token.calendar_id,
            channel_id = %channel.channel_id,
            expiration = ?channel.expiration,
            "Watch channel created"
        );
        Ok(channel)
    }

    /// Stop a channel. The remote stop is best effort; the local row is
    /// always marked stopped.
    pub async fn stop_watch_channel(
        &self,
        token: &CalendarToken,
        channel: &WatchChannel,
    ) -> Result<(), CalendarError> {
        match self.ensure_fresh_token(token).await {
            Ok(access_token) => self.stop_channel_with(&access_token, channel).await,
            Err(e) => {
                tracing::warn!(channel_id = %channel.channel_id, error = %e, "Stopping channel locally only");
                WatchChannelRepo::mark_stopped(&self.pool, channel.id).await?;
                Ok(())
            }
        }
    }

    pub(crate) async fn stop_channel_with(
        &self,
        access_token: &str,
        channel: &WatchChannel,
    ) -> Result<(), CalendarError> {
        if let Some(resource_id) = channel.resource_id.as_deref() {
            match self
                .provider
                .stop_channel(access_token, &channel.channel_id, resource_id)
                .await
            {
                Ok(()) | Err(ProviderError::NotFound) => {}
                Err(e) => {
                    tracing::warn!(channel_id = %channel.channel_id, error = %e, "Remote channel stop failed");
                }
            }
        }
        WatchChannelRepo::mark_stopped(&self.pool, channel.id).await?;
        tracing::debug!(channel_id = %channel.channel_id, "Watch channel stopped");
        Ok(())
    }

    /// Replace the calendar's channel if it is missing or expires within
    /// the renewal window. Returns the new channel when one was created.
    pub async fn renew_if_needed(
        &self,
        token: &CalendarToken,
    ) -> Result<Option<WatchChannel>, CalendarError> {
        let now = Utc::now();
        let active =
            WatchChannelRepo::list_active_for(&self.pool, token.user_id, &token.calendar_id).await?;

        let needs_new = active.is_empty()
            || active.iter().any(|c| channel_needs_renewal(c.expiration, now));
        if !needs_new {
            return Ok(None);
        }

        tracing::info!(
            user_id = token.user_id,
            calendar_id = %token.calendar_id,
            active = active.len(),
            "Renewing watch channel"
        );
        self.create_watch_channel(token).await.map(Some)
    }
}
