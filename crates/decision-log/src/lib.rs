//! # decision-log
//!
//! Append-only JSON-lines record of every completed authorization decision,
//! written by a background task so the request path never blocks on disk.

mod entry;
mod sink;

pub use entry::DecisionEntry;
pub use sink::{DecisionLogError, DecisionSink};
