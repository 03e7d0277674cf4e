//! # subject-codec
//!
//! Decodes the untrusted, self-describing subject value carried in a
//! `CheckAuthorization` call into the typed [`Subject`] sum type.
//!
//! Three subject kinds exist in the PolicyKit protocol: `unix-process`,
//! `unix-session`, and `system-bus-name`. All three are decoded; the
//! credential resolver only supports process and bus-name subjects.

mod decode;
mod subject;

pub use decode::{decode_subject, DecodeError};
pub use subject::{Subject, MAX_FIELD_LEN};
