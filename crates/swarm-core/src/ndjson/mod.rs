//! NDJSON event normalization for agent CLI output.
//!
//! Each supported CLI streams its own JSON-lines dialect. This module turns
//! one parsed line into zero or more [`EventKind`]s with a shared shape,
//! implementing a tolerant reader pattern: unknown fields are ignored and
//! unknown event types pass through as [`EventKind::Other`].
//!
//! [`summary`] digests accumulated events for callers that do not want the
//! full stream.

mod parser;
pub mod summary;
mod types;

pub use parser::{extract_timestamp, normalize_events, parse_line};
pub use summary::{
    DetailLevel, EventDelta, EventSummary, Priority, event_delta, filter_by_priority,
    summarize_events,
};
pub use types::*;
