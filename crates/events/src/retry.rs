//! Message-level retry of transient channel failures.

use litis_core::bulletin_message::BatchMessage;
use litis_core::retry::RetryPolicy;
use serde::Serialize;

use crate::delivery::NotificationChannel;

/// Result of sending one message on one channel, retries included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub channel_message_id: Option<String>,
    pub error: Option<String>,
    /// Attempts made, the first one included.
    pub attempts: u32,
}

/// Send `message`, retrying transient failures according to `policy`.
///
/// Permanent failures (bad address, 4xx other than 429) stop immediately.
/// Never returns an error: the failure is reported in the outcome.
pub async fn send_with_retry(
    channel: &dyn NotificationChannel,
    destination: &str,
    message: &BatchMessage,
    policy: &RetryPolicy,
) -> SendOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match channel.send_batch(destination, message).await {
            Ok(id) => {
                return SendOutcome {
                    success: true,
                    channel_message_id: Some(id),
                    error: None,
                    attempts: attempt,
                }
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    channel = %channel.channel(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Alert delivery attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::error!(
                    channel = %channel.channel(),
                    attempts = attempt,
                    error = %e,
                    "Alert delivery failed"
                );
                return SendOutcome {
                    success: false,
                    channel_message_id: None,
                    error: Some(e.to_string()),
                    attempts: attempt,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use litis_core::bulletin_message::TEMPLATE_SINGLE_CASE;
    use litis_core::delivery::Channel;

    use super::*;
    use crate::delivery::DeliveryError;

    /// Fails with the given status `failures` times, then succeeds.
    struct Flaky {
        failures: u32,
        status: u16,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, status: u16) -> Self {
            Self {
                failures,
                status,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl NotificationChannel for Flaky {
        fn channel(&self) -> Channel {
            Channel::WhatsApp
        }

        async fn send_batch(&self, _: &str, _: &BatchMessage) -> Result<String, DeliveryError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(DeliveryError::HttpStatus {
                    status: self.status,
                    body: "error".into(),
                })
            } else {
                Ok(format!("msg-{n}"))
            }
        }
    }

    fn message() -> BatchMessage {
        BatchMessage {
            subject: String::new(),
            text: String::new(),
            html: String::new(),
            template_name: TEMPLATE_SINGLE_CASE,
            template_params: vec![],
            alert_count: 1,
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let channel = Flaky::new(2, 503);
        let outcome = send_with_retry(&channel, "5255", &message(), &RetryPolicy::immediate(3)).await;
        assert!(outcome.success);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.channel_message_id.as_deref(), Some("msg-2"));
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let channel = Flaky::new(10, 503);
        let outcome = send_with_retry(&channel, "5255", &message(), &RetryPolicy::immediate(3)).await;
        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(channel.calls.load(Ordering::SeqCst), 3);
        assert!(outcome.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let channel = Flaky::new(1, 400);
        let outcome = send_with_retry(&channel, "5255", &message(), &RetryPolicy::immediate(3)).await;
        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 1);
    }
}
