//! External delivery channels for alert notifications.
//!
//! Each channel sends one pre-rendered [`BatchMessage`] to one destination
//! and returns the provider's message id. Retry and bookkeeping live in the
//! dispatcher, not in the channels.

use async_trait::async_trait;
use litis_core::bulletin_message::BatchMessage;
use litis_core::delivery::Channel;

pub mod email;
pub mod whatsapp;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for channel delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status.
    #[error("Provider returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The provider answered 2xx but the body was not usable.
    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),

    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

impl DeliveryError {
    /// Whether retrying the same send may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Smtp(e) => e.is_transient() || e.is_timeout(),
            Self::InvalidResponse(_) | Self::Address(_) | Self::Build(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Channel trait
// ---------------------------------------------------------------------------

/// A provider able to deliver a batched alert message.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Which channel this provider implements.
    fn channel(&self) -> Channel;

    /// Send `message` to `destination` (phone number or email address).
    ///
    /// Returns the provider's message id.
    async fn send_batch(
        &self,
        destination: &str,
        message: &BatchMessage,
    ) -> Result<String, DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_transience() {
        let err = |status| DeliveryError::HttpStatus {
            status,
            body: String::new(),
        };
        assert!(err(429).is_transient());
        assert!(err(503).is_transient());
        assert!(!err(400).is_transient());
        assert!(!err(401).is_transient());
    }

    #[test]
    fn build_errors_are_permanent() {
        assert!(!DeliveryError::Build("missing body".into()).is_transient());
        assert!(!DeliveryError::InvalidResponse("no id".into()).is_transient());
    }

    #[test]
    fn error_display() {
        let err = DeliveryError::HttpStatus {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "Provider returned HTTP 502: bad gateway");
    }
}
