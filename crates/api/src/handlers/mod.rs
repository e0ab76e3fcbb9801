pub mod alerts;
pub mod calendar;
pub mod cases;
pub mod cron;
