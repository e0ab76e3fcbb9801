//! Email alert delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport and sends the
//! batched alert as a `multipart/alternative` message (plain text + HTML).
//! If `SMTP_HOST` is not set, [`EmailConfig::from_env`] returns `None` and
//! the email channel is disabled.

use async_trait::async_trait;
use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use litis_core::bulletin_message::BatchMessage;
use litis_core::delivery::Channel;

use super::{DeliveryError, NotificationChannel};

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "Litis Alertas <alertas@litis.mx>";

/// Configuration for the SMTP email channel.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" mailbox.
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("from_address", &self.from_address)
            .field("smtp_user", &self.smtp_user)
            .finish_non_exhaustive()
    }
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set.
    ///
    /// | Variable        | Required | Default                             |
    /// |-----------------|----------|-------------------------------------|
    /// | `SMTP_HOST`     | yes      |                                     |
    /// | `SMTP_PORT`     | no       | `587`                               |
    /// | `SMTP_FROM`     | no       | `Litis Alertas <alertas@litis.mx>`  |
    /// | `SMTP_USER`     | no       |                                     |
    /// | `SMTP_PASSWORD` | no       |                                     |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }

    /// Domain part of the sender address, used for Message-IDs.
    fn sender_domain(&self) -> &str {
        self.from_address
            .rsplit('@')
            .next()
            .map(|d| d.trim_end_matches('>').trim())
            .filter(|d| !d.is_empty() && *d != self.from_address)
            .unwrap_or("litis.local")
    }
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends batched alert emails via SMTP.
pub struct EmailDelivery {
    config: EmailConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailDelivery {
    /// Build the SMTP transport. Fails if the relay host is unusable.
    pub fn new(config: EmailConfig) -> Result<Self, DeliveryError> {
        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            mailer: transport_builder.build(),
            config,
        })
    }

    fn build_message(&self, to: &str, message: &BatchMessage) -> Result<(Message, String), DeliveryError> {
        let message_id = format!("<{}@{}>", uuid::Uuid::new_v4(), self.config.sender_domain());
        let email = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(to.parse()?)
            .subject(message.subject.as_str())
            .message_id(Some(message_id.clone()))
            .multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                message.html.clone(),
            ))
            .map_err(|e| DeliveryError::Build(e.to_string()))?;
        Ok((email, message_id))
    }
}

#[async_trait]
impl NotificationChannel for EmailDelivery {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send_batch(
        &self,
        destination: &str,
        message: &BatchMessage,
    ) -> Result<String, DeliveryError> {
        let (email, message_id) = self.build_message(destination, message)?;
        self.mailer.send(email).await?;

        tracing::info!(
            alert_count = message.alert_count,
            message_id = %message_id,
            "Alert email sent"
        );
        Ok(message_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
