//! Bulletin ingestion and matching orchestration.
//!
//! - [`ingest`]: normalize and idempotently store published entries.
//! - [`matcher`]: match unprocessed entries against monitored cases and
//!   record alerts.
//! - [`backfill`]: historical check of a newly monitored case against
//!   every stored entry.
//!
//! Nothing here sends notifications; new alerts are picked up by the
//! notification sweep.

pub mod backfill;
pub mod error;
pub mod ingest;
pub mod matcher;

pub use backfill::{check_historical_matches, HistoricalCheckReport};
pub use error::PipelineError;
pub use ingest::{ingest_entries, prepare_entry, IngestReport};
pub use matcher::{run_matching, MatchRunReport};
