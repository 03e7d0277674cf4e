//! # policy-store
//!
//! Parses the groupcheck policy file format and builds the immutable
//! action-id → groups index the authorization evaluator consults.
//!
//! The format is deliberately tiny: one rule per line, no whitespace,
//! `#` comments.
//!
//! ```text
//! # reboot allowed for admins
//! org.freedesktop.login1.reboot="adm,wheel"
//! ```
//!
//! Loading is all-or-nothing: a single malformed line anywhere in the
//! source fails the entire load, and the daemon refuses to start.

mod grammar;
pub mod loader;
mod store;

pub use grammar::{GrammarError, MAX_GROUPS};
pub use loader::{load_path, load_str, PolicyLoadError};
pub use store::PolicyStore;
