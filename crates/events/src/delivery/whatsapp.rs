//! WhatsApp delivery through the Meta Cloud API.
//!
//! Alerts are sent as pre-approved message templates, the only message type
//! a business may send outside a customer-initiated conversation. The
//! template name and body parameters come from the composed
//! [`BatchMessage`].

use std::time::Duration;

use async_trait::async_trait;
use litis_core::bulletin_message::BatchMessage;
use litis_core::delivery::Channel;
use serde::{Deserialize, Serialize};

use super::{DeliveryError, NotificationChannel};

/// HTTP request timeout for a single send.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v21.0";

const DEFAULT_TEMPLATE_LANGUAGE: &str = "es_MX";

// ---------------------------------------------------------------------------
// WhatsAppConfig
// ---------------------------------------------------------------------------

/// Configuration for the WhatsApp Cloud API channel.
#[derive(Clone)]
pub struct WhatsAppConfig {
    /// Permanent system-user access token.
    pub access_token: String,
    /// Sender phone number id.
    pub phone_number_id: String,
    /// Graph API base URL, version included.
    pub api_base: String,
    /// Language code of the approved templates.
    pub template_language: String,
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("phone_number_id", &self.phone_number_id)
            .field("api_base", &self.api_base)
            .field("template_language", &self.template_language)
            .finish_non_exhaustive()
    }
}

impl WhatsAppConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if the access token or phone number id is missing,
    /// which disables the WhatsApp channel.
    ///
    /// | Variable                     | Required | Default                             |
    /// |------------------------------|----------|-------------------------------------|
    /// | `WHATSAPP_ACCESS_TOKEN`      | yes      |                                     |
    /// | `WHATSAPP_PHONE_NUMBER_ID`   | yes      |                                     |
    /// | `WHATSAPP_API_BASE`          | no       | `https://graph.facebook.com/v21.0`  |
    /// | `WHATSAPP_TEMPLATE_LANGUAGE` | no       | `es_MX`                             |
    pub fn from_env() -> Option<Self> {
        let access_token = std::env::var("WHATSAPP_ACCESS_TOKEN").ok()?;
        let phone_number_id = std::env::var("WHATSAPP_PHONE_NUMBER_ID").ok()?;
        Some(Self {
            access_token,
            phone_number_id,
            api_base: std::env::var("WHATSAPP_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            template_language: std::env::var("WHATSAPP_TEMPLATE_LANGUAGE")
                .unwrap_or_else(|_| DEFAULT_TEMPLATE_LANGUAGE.to_string()),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.api_base.trim_end_matches('/'),
            self.phone_number_id
        )
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct TemplateMessage<'a> {
    messaging_product: &'static str,
    to: String,
    #[serde(rename = "type")]
    kind: &'static str,
    template: Template<'a>,
}

#[derive(Debug, Serialize)]
struct Template<'a> {
    name: &'a str,
    language: Language<'a>,
    components: Vec<Component<'a>>,
}

#[derive(Debug, Serialize)]
struct Language<'a> {
    code: &'a str,
}

#[derive(Debug, Serialize)]
struct Component<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    parameters: Vec<TextParameter<'a>>,
}

#[derive(Debug, Serialize)]
struct TextParameter<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

/// Reduce a phone number to the digits-only international form the API
/// expects (`+52 1 55-1234-5678` -> `5215512345678`).
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

fn template_message<'a>(to: &str, language: &'a str, message: &'a BatchMessage) -> TemplateMessage<'a> {
    TemplateMessage {
        messaging_product: "whatsapp",
        to: normalize_phone(to),
        kind: "template",
        template: Template {
            name: message.template_name,
            language: Language { code: language },
            components: vec![Component {
                kind: "body",
                parameters: message
                    .template_params
                    .iter()
                    .map(|p| TextParameter {
                        kind: "text",
                        text: p,
                    })
                    .collect(),
            }],
        },
    }
}

// ---------------------------------------------------------------------------
// WhatsAppDelivery
// ---------------------------------------------------------------------------

/// Sends template messages through the WhatsApp Cloud API.
pub struct WhatsAppDelivery {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppDelivery {
    pub fn new(config: WhatsAppConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { config, client }
    }
}

#[async_trait]
impl NotificationChannel for WhatsAppDelivery {
    fn channel(&self) -> Channel {
        Channel::WhatsApp
    }

    async fn send_batch(
        &self,
        destination: &str,
        message: &BatchMessage,
    ) -> Result<String, DeliveryError> {
        let payload = template_message(destination, &self.config.template_language, message);
        let response = self
            .client
            .post(self.config.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body: SendResponse = response.json().await?;
        let id = body
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| DeliveryError::InvalidResponse("response has no message id".into()))?;

        tracing::info!(
            template = message.template_name,
            alert_count = message.alert_count,
            message_id = %id,
            "WhatsApp alert sent"
        );
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use litis_core::bulletin_message::TEMPLATE_MULTIPLE_CASES;

    fn message() -> BatchMessage {
        BatchMessage {
            subject: "3 de tus expedientes".into(),
            text: String::new(),
            html: String::new(),
            template_name: TEMPLATE_MULTIPLE_CASES,
            template_params: vec!["Ana".into(), "3".into(), "10/03/2025".into()],
            alert_count: 3,
        }
    }

    #[test]
    fn phone_numbers_are_reduced_to_digits() {
        assert_eq!(normalize_phone("+52 1 55-1234-5678"), "5215512345678");
        assert_eq!(normalize_phone("(55) 1234 5678"), "5512345678");
    }

    #[test]
    fn template_payload_shape() {
        let msg = message();
        let value = serde_json::to_value(template_message("+52 55 1234 5678", "es_MX", &msg)).unwrap();
        assert_eq!(value["messaging_product"], "whatsapp");
        assert_eq!(value["to"], "525512345678");
        assert_eq!(value["type"], "template");
        assert_eq!(value["template"]["name"], TEMPLATE_MULTIPLE_CASES);
        assert_eq!(value["template"]["language"]["code"], "es_MX");
        let params = value["template"]["components"][0]["parameters"].as_array().unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params[1]["type"], "text");
        assert_eq!(params[1]["text"], "3");
    }

    #[test]
    fn messages_url_tolerates_trailing_slash() {
        let config = WhatsAppConfig {
            access_token: "t".into(),
            phone_number_id: "123".into(),
            api_base: "https://graph.facebook.com/v21.0/".into(),
            template_language: "es_MX".into(),
        };
        assert_eq!(config.messages_url(), "https://graph.facebook.com/v21.0/123/messages");
        assert!(!format!("{config:?}").contains("access_token"));
    }

    #[test]
    fn send_response_reads_first_message_id() {
        let body: SendResponse =
            serde_json::from_str(r#"{"messaging_product":"whatsapp","messages":[{"id":"wamid.X"}]}"#)
                .unwrap();
        assert_eq!(body.messages[0].id, "wamid.X");
    }
}
