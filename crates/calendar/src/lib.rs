//! External calendar synchronization for Litis.
//!
//! - [`provider`]: the [`CalendarProvider`] boundary and its typed
//!   request/response values.
//! - [`google`]: Google Calendar API v3 implementation.
//! - [`CalendarSyncEngine`]: inbound (token-based incremental) and outbound
//!   (etag-guarded) sync, watch-channel lifecycle, webhook handling, and the
//!   periodic maintenance pass. Its methods are split across [`sync`],
//!   [`watch`], [`connection`], [`webhook`], and [`maintenance`].

pub mod connection;
pub mod error;
pub mod google;
pub mod maintenance;
pub mod provider;
pub mod sync;
pub mod watch;
pub mod webhook;

pub use error::{CalendarError, ProviderError};
pub use google::{GoogleCalendarClient, GoogleCalendarConfig};
pub use provider::CalendarProvider;
pub use sync::{CalendarSyncEngine, PushReport, SyncReport};
pub use webhook::{WebhookNotification, WebhookOutcome};
pub use connection::{ConnectReport, ConnectionStatus};
pub use maintenance::MaintenanceReport;
