//! Litis domain core.
//!
//! Pure domain logic with no I/O, shared by the database, pipeline,
//! notification, calendar, and API crates:
//!
//! - [`normalize`]: accent/case/whitespace folding used by every comparison.
//! - [`case_number`] and [`matching`]: bulletin-to-case matching.
//! - [`delivery`] and [`bulletin_message`]: alert batching and message text.
//! - [`calendar_state`]: calendar connection state machine.
//! - [`retry`]: bounded backoff for provider calls.

pub mod bulletin_message;
pub mod calendar_state;
pub mod case_number;
pub mod delivery;
pub mod error;
pub mod matching;
pub mod normalize;
pub mod retry;
pub mod types;
