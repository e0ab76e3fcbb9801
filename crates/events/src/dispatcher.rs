//! Batched, per-channel alert dispatch.
//!
//! [`NotificationDispatcher::dispatch_pending`] loads every alert still
//! needing a send, groups them into one batch per (user, bulletin date), and
//! for each batch sends at most one message per channel. Channels run
//! concurrently and independently: a WhatsApp failure never prevents the
//! email send. Each alert's per-channel flag is then updated and one log row
//! per alert and channel is appended to the notification log.
//!
//! Failures never roll back alert creation; failed channels are picked up
//! again by later sweeps until [`MAX_DELIVERY_ATTEMPTS`] is reached.
//!
//! Pending alerts are claimed with a lease before anything is sent, so
//! overlapping sweeps (the background sweeper and the cron endpoints) never
//! send the same alert twice.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use litis_core::bulletin_message::compose;
use litis_core::delivery::{
    batch_alerts, AlertBatch, Channel, DeliveryOutcome, PendingAlert, MAX_DELIVERY_ATTEMPTS,
};
use litis_core::retry::RetryPolicy;
use litis_core::types::DbId;
use litis_db::models::notification_log::NewNotificationLog;
use litis_db::models::user::User;
use litis_db::repositories::{AlertRepo, NotificationLogRepo, UserRepo};
use litis_db::DbPool;
use serde::Serialize;

use crate::delivery::NotificationChannel;
use crate::retry::{send_with_retry, SendOutcome};

/// Maximum alerts loaded per sweep.
const DEFAULT_BATCH_LIMIT: i64 = 500;

/// How long a sweep owns the alerts it claimed. Must outlast a full sweep
/// including send retries.
const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(15 * 60);

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Counts from one dispatch sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// (user, bulletin date) batches processed.
    pub batches: usize,
    /// Alerts touched.
    pub alerts: usize,
    pub whatsapp_messages_sent: usize,
    pub whatsapp_messages_failed: usize,
    pub email_messages_sent: usize,
    pub email_messages_failed: usize,
    /// Channel sends skipped because the channel is disabled for the user.
    pub skipped: usize,
    /// Batches that could not be processed (database errors).
    pub errors: usize,
}

impl DispatchReport {
    fn count(&mut self, channel: Channel, result: &ChannelResult) {
        match (&result.outcome, channel) {
            (DeliveryOutcome::Sent, Channel::WhatsApp) => self.whatsapp_messages_sent += 1,
            (DeliveryOutcome::Failed, Channel::WhatsApp) => self.whatsapp_messages_failed += 1,
            (DeliveryOutcome::Sent, Channel::Email) => self.email_messages_sent += 1,
            (DeliveryOutcome::Failed, Channel::Email) => self.email_messages_failed += 1,
            (DeliveryOutcome::NotApplicable, _) => self.skipped += 1,
        }
    }
}

/// Outcome of one channel for one batch.
#[derive(Debug, Clone)]
struct ChannelResult {
    outcome: DeliveryOutcome,
    /// Alerts covered by this channel's message.
    alert_ids: Vec<DbId>,
    send: Option<SendOutcome>,
    template: Option<&'static str>,
}

impl ChannelResult {
    fn outcome_for(&self, alert_id: DbId) -> Option<DeliveryOutcome> {
        self.alert_ids.contains(&alert_id).then_some(self.outcome)
    }
}

// ---------------------------------------------------------------------------
// NotificationDispatcher
// ---------------------------------------------------------------------------

/// Sends pending alerts through the configured channels.
///
/// A channel that is not configured (`None`) is treated as disabled for
/// every user.
pub struct NotificationDispatcher {
    whatsapp: Option<Arc<dyn NotificationChannel>>,
    email: Option<Arc<dyn NotificationChannel>>,
    retry: RetryPolicy,
    app_url: Option<String>,
    batch_limit: i64,
    claim_lease: Duration,
}

impl NotificationDispatcher {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            whatsapp: None,
            email: None,
            retry,
            app_url: None,
            batch_limit: DEFAULT_BATCH_LIMIT,
            claim_lease: DEFAULT_CLAIM_LEASE,
        }
    }

    pub fn with_whatsapp(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.whatsapp = Some(channel);
        self
    }

    pub fn with_email(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.email = Some(channel);
        self
    }

    /// Link included in emails pointing users at their alert inbox.
    pub fn with_app_url(mut self, url: Option<String>) -> Self {
        self.app_url = url;
        self
    }

    pub fn with_batch_limit(mut self, limit: i64) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    fn provider(&self, channel: Channel) -> Option<&Arc<dyn NotificationChannel>> {
        match channel {
            Channel::WhatsApp => self.whatsapp.as_ref(),
            Channel::Email => self.email.as_ref(),
        }
    }

    /// Dispatch every alert that still needs a send.
    ///
    /// Only a failure to claim the pending set is returned as an error; a
    /// failing batch is logged, counted in [`DispatchReport::errors`], and
    /// the sweep continues. Alerts claimed by another sweep are left alone.
    pub async fn dispatch_pending(&self, pool: &DbPool) -> Result<DispatchReport, sqlx::Error> {
        let pending = AlertRepo::claim_pending_delivery(
            pool,
            MAX_DELIVERY_ATTEMPTS,
            self.batch_limit,
            self.claim_lease,
        )
        .await?;
        let mut report = DispatchReport::default();

        for batch in batch_alerts(pending) {
            report.batches += 1;
            report.alerts += batch.alerts.len();
            match self.dispatch_batch(pool, &batch, &mut report).await {
                Ok(unrecorded) => self.release(pool, &unrecorded).await,
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(
                        user_id = batch.user_id,
                        bulletin_date = %batch.bulletin_date,
                        error = %e,
                        "Failed to dispatch alert batch"
                    );
                }
            }
        }

        if report.batches > 0 {
            tracing::info!(
                batches = report.batches,
                alerts = report.alerts,
                whatsapp_sent = report.whatsapp_messages_sent,
                email_sent = report.email_messages_sent,
                failed = report.whatsapp_messages_failed + report.email_messages_failed,
                "Alert dispatch sweep finished"
            );
        }
        Ok(report)
    }

    /// Returns the alerts of the batch that got no outcome recorded.
    ///
    /// On error the batch keeps its lease, so a channel message that went
    /// out before the failure is not resent before the lease expires.
    async fn dispatch_batch(
        &self,
        pool: &DbPool,
        batch: &AlertBatch,
        report: &mut DispatchReport,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let Some(user) = UserRepo::find_by_id(pool, batch.user_id).await? else {
            tracing::warn!(user_id = batch.user_id, "Alert owner not found, skipping batch");
            return Ok(batch.alerts.iter().map(|a| a.alert_id).collect());
        };

        let (whatsapp, email) = tokio::join!(
            self.deliver(Channel::WhatsApp, &user, batch),
            self.deliver(Channel::Email, &user, batch),
        );

        for (channel, result) in [(Channel::WhatsApp, &whatsapp), (Channel::Email, &email)] {
            if let Some(result) = result {
                report.count(channel, result);
            }
        }

        let mut unrecorded = Vec::new();
        for alert in &batch.alerts {
            let wa = whatsapp.as_ref().and_then(|r| r.outcome_for(alert.alert_id));
            let em = email.as_ref().and_then(|r| r.outcome_for(alert.alert_id));
            if wa.is_none() && em.is_none() {
                unrecorded.push(alert.alert_id);
                continue;
            }
            AlertRepo::record_dispatch(pool, alert.alert_id, wa, em).await?;
        }

        for (channel, result) in [(Channel::WhatsApp, &whatsapp), (Channel::Email, &email)] {
            if let Some(result) = result {
                self.log_attempts(pool, &user, batch.bulletin_date, channel, result).await;
            }
        }

        Ok(unrecorded)
    }

    async fn release(&self, pool: &DbPool, alert_ids: &[DbId]) {
        if let Err(e) = AlertRepo::release_claims(pool, alert_ids).await {
            tracing::warn!(count = alert_ids.len(), error = %e, "Failed to release alert claims");
        }
    }

    /// Send one channel's message for the alerts of `batch` that need it.
    ///
    /// Returns `None` when no alert in the batch needs this channel.
    async fn deliver(&self, channel: Channel, user: &User, batch: &AlertBatch) -> Option<ChannelResult> {
        let needing: Vec<&PendingAlert> = batch.needing(channel);
        if needing.is_empty() {
            return None;
        }
        let alert_ids = needing.iter().map(|a| a.alert_id).collect();

        let destination = match channel {
            Channel::WhatsApp => user.whatsapp_destination(),
            Channel::Email => user.email_destination(),
        };
        let (Some(provider), Some(destination)) = (self.provider(channel), destination) else {
            return Some(ChannelResult {
                outcome: DeliveryOutcome::NotApplicable,
                alert_ids,
                send: None,
                template: None,
            });
        };

        let message = compose(
            user.full_name.as_deref(),
            batch.bulletin_date,
            &needing,
            self.app_url.as_deref(),
        );
        let send = send_with_retry(provider.as_ref(), destination, &message, &self.retry).await;
        let outcome = if send.success {
            DeliveryOutcome::Sent
        } else {
            DeliveryOutcome::Failed
        };

        Some(ChannelResult {
            outcome,
            alert_ids,
            send: Some(send),
            template: Some(message.template_name),
        })
    }

    /// Append one log row per covered alert. Log failures are only traced.
    async fn log_attempts(
        &self,
        pool: &DbPool,
        user: &User,
        bulletin_date: NaiveDate,
        channel: Channel,
        result: &ChannelResult,
    ) {
        let context = serde_json::json!({
            "bulletin_date": bulletin_date,
            "batch_size": result.alert_ids.len(),
            "template": result.template,
        });

        for &alert_id in &result.alert_ids {
            let entry = NewNotificationLog {
                alert_id: Some(alert_id),
                user_id: user.id,
                channel: channel.as_str(),
                status: result.outcome.as_str(),
                provider_message_id: result.send.as_ref().and_then(|s| s.channel_message_id.clone()),
                attempts: result.send.as_ref().map_or(0, |s| s.attempts as i32),
                error: result.send.as_ref().and_then(|s| s.error.clone()),
                context: context.clone(),
            };
            if let Err(e) = NotificationLogRepo::append(pool, &entry).await {
                tracing::warn!(alert_id, channel = %channel, error = %e, "Failed to append notification log");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use litis_core::bulletin_message::{BatchMessage, TEMPLATE_MULTIPLE_CASES};

    use super::*;
    use crate::delivery::DeliveryError;

    struct Recording {
        channel: Channel,
        fail: bool,
        sent: Mutex<Vec<(String, BatchMessage)>>,
    }

    impl Recording {
        fn new(channel: Channel, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                channel,
                fail,
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl NotificationChannel for Recording {
        fn channel(&self) -> Channel {
            self.channel
        }

        async fn send_batch(&self, to: &str, message: &BatchMessage) -> Result<String, DeliveryError> {
            self.sent.lock().unwrap().push((to.to_string(), message.clone()));
            if self.fail {
                Err(DeliveryError::HttpStatus {
                    status: 400,
                    body: "rejected".into(),
                })
            } else {
                Ok("id-1".into())
            }
        }
    }

    fn user(whatsapp_enabled: bool) -> User {
        User {
            id: 7,
            email: "ana@despacho.mx".into(),
            full_name: Some("Ana".into()),
            whatsapp_phone: Some("+52 55 1234 5678".into()),
            whatsapp_enabled,
            email_enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn batch(n: i64) -> AlertBatch {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        AlertBatch {
            user_id: 7,
            bulletin_date: date,
            alerts: (1..=n)
                .map(|id| PendingAlert {
                    alert_id: id,
                    user_id: 7,
                    bulletin_date: date,
                    court_name: format!("Juzgado {id} Civil"),
                    case_number: Some(format!("{id}/2025")),
                    party_name: None,
                    whatsapp_sent: None,
                    email_sent: None,
                    dispatched: false,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn batch_is_sent_once_per_channel() {
        let wa = Recording::new(Channel::WhatsApp, false);
        let dispatcher = NotificationDispatcher::new(RetryPolicy::immediate(1)).with_whatsapp(wa.clone());

        let result = dispatcher.deliver(Channel::WhatsApp, &user(true), &batch(3)).await.unwrap();
        assert_eq!(result.outcome, DeliveryOutcome::Sent);
        assert_eq!(result.alert_ids, vec![1, 2, 3]);

        let sent = wa.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+52 55 1234 5678");
        assert_eq!(sent[0].1.template_name, TEMPLATE_MULTIPLE_CASES);
    }

    #[tokio::test]
    async fn disabled_or_unconfigured_channel_is_not_applicable() {
        let wa = Recording::new(Channel::WhatsApp, false);
        let dispatcher = NotificationDispatcher::new(RetryPolicy::immediate(1)).with_whatsapp(wa.clone());

        let result = dispatcher.deliver(Channel::WhatsApp, &user(false), &batch(1)).await.unwrap();
        assert_eq!(result.outcome, DeliveryOutcome::NotApplicable);
        assert!(wa.sent.lock().unwrap().is_empty());

        let result = dispatcher.deliver(Channel::Email, &user(true), &batch(1)).await.unwrap();
        assert_eq!(result.outcome, DeliveryOutcome::NotApplicable);
    }

    #[tokio::test]
    async fn failure_on_one_channel_does_not_affect_the_other() {
        let wa = Recording::new(Channel::WhatsApp, true);
        let email = Recording::new(Channel::Email, false);
        let dispatcher = NotificationDispatcher::new(RetryPolicy::immediate(2))
            .with_whatsapp(wa.clone())
            .with_email(email.clone());

        let u = user(true);
        let b = batch(2);
        let (w, e) = tokio::join!(
            dispatcher.deliver(Channel::WhatsApp, &u, &b),
            dispatcher.deliver(Channel::Email, &u, &b),
        );
        let (w, e) = (w.unwrap(), e.unwrap());
        assert_eq!(w.outcome, DeliveryOutcome::Failed);
        assert_eq!(w.send.as_ref().unwrap().attempts, 1, "400 is permanent");
        assert_eq!(e.outcome, DeliveryOutcome::Sent);
        assert_eq!(email.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_alerts_needing_the_channel_are_covered() {
        let email = Recording::new(Channel::Email, false);
        let dispatcher = NotificationDispatcher::new(RetryPolicy::immediate(1)).with_email(email.clone());

        let mut b = batch(2);
        b.alerts[0].dispatched = true;
        b.alerts[0].email_sent = Some(true);

        let result = dispatcher.deliver(Channel::Email, &user(true), &b).await.unwrap();
        assert_eq!(result.alert_ids, vec![2]);
        assert_eq!(result.outcome_for(1), None);
        assert_eq!(result.outcome_for(2), Some(DeliveryOutcome::Sent));
        assert_eq!(email.sent.lock().unwrap()[0].1.alert_count, 1);

        b.alerts[1].dispatched = true;
        b.alerts[1].email_sent = Some(true);
        assert!(dispatcher.deliver(Channel::Email, &user(true), &b).await.is_none());
    }
}
