//! Litis HTTP server.
//!
//! Exposes the user-facing endpoints (monitored cases, alerts, calendar),
//! the scheduler entry points under `/cron`, and the calendar push webhook.

pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
