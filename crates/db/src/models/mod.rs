//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row and the input structs its repository accepts.

pub mod alert;
pub mod bulletin;
pub mod calendar;
pub mod monitored_case;
pub mod notification_log;
pub mod user;
