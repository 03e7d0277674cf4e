//! # cred-resolver
//!
//! Resolves a decoded [`Subject`](subject_codec::Subject) to verified OS
//! credentials: real/effective uid, primary gid, and supplementary gids.
//!
//! OS access goes through the [`SystemAccess`] trait so the resolver stays a
//! pure function of its inputs. The production implementation reads `/proc`
//! and `/etc/group`; tests substitute an in-memory fake.
//!
//! Resolution applies two anti-spoofing checks: the claimed process start
//! time must match the OS record (pid-reuse defense), and the real uid must
//! equal the effective uid (setuid re-exec defense).

mod creds;
mod resolver;
mod system;

pub use creds::ResolvedCredentials;
pub use resolver::{resolve, ResolveError};
pub use system::{ProcSystem, SystemAccess, SystemError};
