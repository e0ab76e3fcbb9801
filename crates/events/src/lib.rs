//! Litis alert notification infrastructure.
//!
//! - [`delivery`]: external channels (WhatsApp Cloud API, SMTP email)
//!   behind the [`NotificationChannel`] trait.
//! - [`retry`]: bounded retry of transient channel failures.
//! - [`NotificationDispatcher`]: batches pending alerts per user and
//!   bulletin date, sends each channel independently, and records the
//!   outcome on every alert and in the notification log.
//! - [`NotificationSweeper`]: periodic background dispatch.

pub mod delivery;
pub mod dispatcher;
pub mod retry;
pub mod sweep;

pub use delivery::email::{EmailConfig, EmailDelivery};
pub use delivery::whatsapp::{WhatsAppConfig, WhatsAppDelivery};
pub use delivery::{DeliveryError, NotificationChannel};
pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use retry::{send_with_retry, SendOutcome};
pub use sweep::NotificationSweeper;
