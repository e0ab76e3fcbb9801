//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Multi-statement operations open
//! their own transaction.

pub mod alert_repo;
pub mod bulletin_entry_repo;
pub mod calendar_event_repo;
pub mod calendar_token_repo;
pub mod monitored_case_repo;
pub mod notification_log_repo;
pub mod user_repo;
pub mod watch_channel_repo;

pub use alert_repo::AlertRepo;
pub use bulletin_entry_repo::BulletinEntryRepo;
pub use calendar_event_repo::CalendarEventRepo;
pub use calendar_token_repo::CalendarTokenRepo;
pub use monitored_case_repo::MonitoredCaseRepo;
pub use notification_log_repo::NotificationLogRepo;
pub use user_repo::UserRepo;
pub use watch_channel_repo::WatchChannelRepo;
