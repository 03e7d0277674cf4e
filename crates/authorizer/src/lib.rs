//! # authorizer
//!
//! The fail-closed authorization decision: combine a policy-store lookup
//! with resolved credentials and match against supplementary group ids.
//!
//! ```rust,no_run
//! use authorizer::{decide, Verdict};
//! use cred_resolver::ProcSystem;
//! use subject_codec::Subject;
//!
//! let store = policy_store::load_path("/etc/groupcheck.policy").unwrap();
//! let system = ProcSystem::new();
//! let subject = Subject::Process { pid: 4711, start_time: 555123 };
//! let verdict = Verdict::from_decision(decide(
//!     &subject,
//!     "org.freedesktop.login1.reboot",
//!     &store,
//!     &system,
//! ));
//! ```

mod evaluator;
mod verdict;

pub use evaluator::decide;
pub use verdict::Verdict;
