use serde_json::Value;

use crate::subject::{Subject, MAX_FIELD_LEN};

/// Why an untrusted subject value was rejected.
///
/// All variants are surfaced to the caller as a protocol-level error; a
/// rejected subject never produces a verdict.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown subject kind '{0}'")]
    UnknownSubjectKind(String),

    #[error("subject detail '{0}' exceeds {MAX_FIELD_LEN} bytes")]
    FieldTooLong(&'static str),

    #[error("malformed subject: {0}")]
    Malformed(&'static str),
}

/// Decode the self-describing wire value `(kind, {key → variant})` into a
/// typed [`Subject`].
///
/// The outer value must be a two-element record: the kind name followed by
/// the detail mapping. Detail keys are dispatched per kind; keys that are
/// not relevant to the active kind are silently ignored so that newer
/// clients can send details this daemon does not know about. Decoding is
/// purely structural and touches no OS resource.
pub fn decode_subject(value: &Value) -> Result<Subject, DecodeError> {
    let record = value
        .as_array()
        .ok_or(DecodeError::Malformed("subject is not a record"))?;

    let [kind, details] = record.as_slice() else {
        return Err(DecodeError::Malformed(
            "subject record must have exactly two elements",
        ));
    };

    let kind = kind
        .as_str()
        .ok_or(DecodeError::Malformed("subject kind is not a string"))?;

    let details = details
        .as_object()
        .ok_or(DecodeError::Malformed("subject details are not a mapping"))?;

    match kind {
        "unix-process" => {
            let mut pid: u32 = 0;
            let mut start_time: u64 = 0;
            for (key, v) in details {
                match key.as_str() {
                    "pid" => pid = read_u32(v, "pid")?,
                    "start-time" => start_time = read_u64(v, "start-time")?,
                    _ => {}
                }
            }
            Ok(Subject::Process { pid, start_time })
        }
        "unix-session" => {
            let mut session_id = String::new();
            for (key, v) in details {
                if key == "session-id" {
                    session_id = read_str(v, "session-id")?;
                }
            }
            Ok(Subject::Session { session_id })
        }
        "system-bus-name" => {
            let mut name = String::new();
            for (key, v) in details {
                if key == "name" {
                    name = read_str(v, "name")?;
                }
            }
            Ok(Subject::BusPeer { name })
        }
        other => Err(DecodeError::UnknownSubjectKind(other.to_string())),
    }
}

fn read_u32(v: &Value, key: &'static str) -> Result<u32, DecodeError> {
    let n = v.as_u64().ok_or(DecodeError::Malformed(key))?;
    u32::try_from(n).map_err(|_| DecodeError::Malformed(key))
}

fn read_u64(v: &Value, key: &'static str) -> Result<u64, DecodeError> {
    v.as_u64().ok_or(DecodeError::Malformed(key))
}

fn read_str(v: &Value, key: &'static str) -> Result<String, DecodeError> {
    let s = v.as_str().ok_or(DecodeError::Malformed(key))?;
    if s.len() > MAX_FIELD_LEN {
        return Err(DecodeError::FieldTooLong(key));
    }
    Ok(s.to_string())
}
