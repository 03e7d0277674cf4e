use std::fmt;

/// Maximum byte length of any string-valued subject detail.
pub const MAX_FIELD_LEN: usize = 255;

/// The entity whose authorization is being checked.
///
/// Exactly one variant is populated; the kind is fixed at decode time and
/// never changes. Session subjects are decoded for protocol compatibility but
/// credential resolution always rejects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// A unix process identified by pid plus the process start time claimed
    /// by the caller. The start time defeats pid-reuse spoofing: resolution
    /// re-reads it from the OS and denies on mismatch.
    Process { pid: u32, start_time: u64 },

    /// A login session. Unsupported for authorization.
    Session { session_id: String },

    /// A named peer on the message bus.
    BusPeer { name: String },
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Process { pid, start_time } => {
                write!(f, "unix process (pid: {pid}, start time: {start_time})")
            }
            Subject::Session { session_id } => {
                write!(f, "unix session (session id: {session_id})")
            }
            Subject::BusPeer { name } => write!(f, "system bus name {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_identifies_the_subject() {
        let p = Subject::Process {
            pid: 4711,
            start_time: 12345,
        };
        assert_eq!(p.to_string(), "unix process (pid: 4711, start time: 12345)");

        let b = Subject::BusPeer {
            name: ":1.174".to_string(),
        };
        assert_eq!(b.to_string(), "system bus name :1.174");
    }
}
