use std::path::PathBuf;

use tracing::warn;

use crate::creds::ResolvedCredentials;

/// Errors from the OS-access layer.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("no such process: {0}")]
    UnknownProcess(u32),

    #[error("no such bus peer: {0}")]
    UnknownPeer(String),

    #[error("malformed credential record for pid {pid}: {reason}")]
    BadRecord { pid: u32, reason: &'static str },

    #[error("credential query failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability for reading OS credentials, process start times, and the group
/// database.
///
/// The credential resolver is a stateless function over this trait, so the
/// fail-closed paths (unknown pid, start-time mismatch, privilege mismatch)
/// can be exercised in tests without touching the real OS.
pub trait SystemAccess: Send + Sync {
    /// Credentials of a running process, by pid.
    fn process_credentials(&self, pid: u32) -> Result<ResolvedCredentials, SystemError>;

    /// The OS's own record of when the process started, in jiffies since
    /// boot.
    fn process_start_time(&self, pid: u32) -> Result<u64, SystemError>;

    /// Credentials of a named peer on the message bus.
    fn peer_credentials(&self, name: &str) -> Result<ResolvedCredentials, SystemError>;

    /// Resolve a group name to its numeric id. `None` when the group does
    /// not exist in the group database.
    fn group_id(&self, name: &str) -> Option<u32>;
}

/// Production [`SystemAccess`] backed by `/proc` and `/etc/group`.
///
/// Bus-peer lookups always fail here; the transport layer wraps this type
/// with its peer directory to answer them.
#[derive(Debug, Clone)]
pub struct ProcSystem {
    proc_root: PathBuf,
    group_file: PathBuf,
}

impl ProcSystem {
    pub fn new() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            group_file: PathBuf::from("/etc/group"),
        }
    }

    /// Construct against alternate locations of the proc filesystem and the
    /// group database.
    pub fn with_roots(proc_root: impl Into<PathBuf>, group_file: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            group_file: group_file.into(),
        }
    }
}

impl Default for ProcSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemAccess for ProcSystem {
    fn process_credentials(&self, pid: u32) -> Result<ResolvedCredentials, SystemError> {
        let path = self.proc_root.join(pid.to_string()).join("status");
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SystemError::UnknownProcess(pid))
            }
            Err(e) => return Err(SystemError::Io(e)),
        };
        parse_status(&text).map_err(|reason| SystemError::BadRecord { pid, reason })
    }

    fn process_start_time(&self, pid: u32) -> Result<u64, SystemError> {
        let path = self.proc_root.join(pid.to_string()).join("stat");
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SystemError::UnknownProcess(pid))
            }
            Err(e) => return Err(SystemError::Io(e)),
        };
        parse_stat_start_time(&text).ok_or(SystemError::BadRecord {
            pid,
            reason: "stat record has no start-time field",
        })
    }

    fn peer_credentials(&self, name: &str) -> Result<ResolvedCredentials, SystemError> {
        Err(SystemError::UnknownPeer(name.to_string()))
    }

    fn group_id(&self, name: &str) -> Option<u32> {
        let db = match std::fs::read_to_string(&self.group_file) {
            Ok(db) => db,
            Err(e) => {
                warn!(file = %self.group_file.display(), error = %e, "cannot read group database");
                return None;
            }
        };
        group_id_in(&db, name)
    }
}

/// Extract real/effective uid, primary gid, and supplementary gids from a
/// `/proc/<pid>/status` document.
fn parse_status(text: &str) -> Result<ResolvedCredentials, &'static str> {
    let mut uid = None;
    let mut euid = None;
    let mut primary_gid = None;
    let mut supplementary_gids = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("Uid:") {
            let mut fields = rest.split_whitespace();
            uid = fields.next().and_then(|f| f.parse().ok());
            euid = fields.next().and_then(|f| f.parse().ok());
        } else if let Some(rest) = line.strip_prefix("Gid:") {
            primary_gid = rest.split_whitespace().next().and_then(|f| f.parse().ok());
        } else if let Some(rest) = line.strip_prefix("Groups:") {
            let gids: Result<Vec<u32>, _> =
                rest.split_whitespace().map(|f| f.parse()).collect();
            supplementary_gids = gids.ok();
        }
    }

    Ok(ResolvedCredentials {
        uid: uid.ok_or("missing or unparsable Uid row")?,
        euid: euid.ok_or("missing effective uid")?,
        primary_gid: primary_gid.ok_or("missing or unparsable Gid row")?,
        supplementary_gids: supplementary_gids.ok_or("missing or unparsable Groups row")?,
    })
}

/// Extract the process start time (field 22, jiffies) from a
/// `/proc/<pid>/stat` record.
///
/// The second field (`comm`) is an unescaped executable name that may itself
/// contain spaces and parentheses, so counting starts after the *last*
/// closing parenthesis.
fn parse_stat_start_time(text: &str) -> Option<u64> {
    let after_comm = &text[text.rfind(')')? + 1..];
    // Field 3 is the first token after comm; field 22 is therefore index 19.
    let field = after_comm.split_whitespace().nth(19)?;
    field.parse().ok()
}

/// Look up a group name in an `/etc/group`-format database.
/// Lines are `name:password:gid:members`.
fn group_id_in(db: &str, name: &str) -> Option<u32> {
    for line in db.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split(':');
        if fields.next() != Some(name) {
            continue;
        }
        let _password = fields.next()?;
        return fields.next()?.parse().ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\tsleep\n\
                          Umask:\t0022\n\
                          State:\tS (sleeping)\n\
                          Pid:\t4711\n\
                          Uid:\t1000\t1000\t1000\t1000\n\
                          Gid:\t100\t100\t100\t100\n\
                          Groups:\t4 24 27 100\n";

    #[test]
    fn parse_status_extracts_all_fields() {
        let creds = parse_status(STATUS).unwrap();
        assert_eq!(creds.uid, 1000);
        assert_eq!(creds.euid, 1000);
        assert_eq!(creds.primary_gid, 100);
        assert_eq!(creds.supplementary_gids, vec![4, 24, 27, 100]);
    }

    #[test]
    fn parse_status_setuid_process() {
        let text = "Uid:\t1000\t0\t0\t0\nGid:\t100\t100\t100\t100\nGroups:\t4\n";
        let creds = parse_status(text).unwrap();
        assert_eq!(creds.uid, 1000);
        assert_eq!(creds.euid, 0);
    }

    #[test]
    fn parse_status_empty_groups_row() {
        let text = "Uid:\t0\t0\t0\t0\nGid:\t0\t0\t0\t0\nGroups: \n";
        let creds = parse_status(text).unwrap();
        assert!(creds.supplementary_gids.is_empty());
    }

    #[test]
    fn parse_status_missing_rows_is_an_error() {
        assert!(parse_status("Name:\tsleep\n").is_err());
        assert!(parse_status("Uid:\t0\t0\t0\t0\nGid:\t0\t0\t0\t0\n").is_err());
    }

    #[test]
    fn stat_start_time_is_field_22() {
        let stat = "4711 (sleep) S 1 4711 4711 0 -1 4194560 167 0 0 0 0 0 0 0 \
                    20 0 1 0 555123 5611520 200 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0";
        assert_eq!(parse_stat_start_time(stat), Some(555_123));
    }

    #[test]
    fn stat_comm_with_spaces_and_parens() {
        // comm is not escaped; an adversarial name must not shift the field
        // offsets.
        let stat = "4711 (a) b) (c) S 1 4711 4711 0 -1 4194560 167 0 0 0 0 0 0 0 \
                    20 0 1 0 98765 5611520 200 0 0 0 0 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0";
        assert_eq!(parse_stat_start_time(stat), Some(98_765));
    }

    #[test]
    fn stat_truncated_record() {
        assert_eq!(parse_stat_start_time("4711 (sleep) S 1 2 3"), None);
        assert_eq!(parse_stat_start_time("garbage"), None);
    }

    #[test]
    fn group_lookup() {
        let db = "root:x:0:\nwheel:x:998:alice,bob\nusers:x:100:\n";
        assert_eq!(group_id_in(db, "wheel"), Some(998));
        assert_eq!(group_id_in(db, "users"), Some(100));
        assert_eq!(group_id_in(db, "nosuch"), None);
        // Member lists must not be confused with group names.
        assert_eq!(group_id_in(db, "alice"), None);
    }

    #[test]
    fn proc_system_reads_from_roots() {
        let dir = tempfile::tempdir().unwrap();
        let proc_root = dir.path().join("proc");
        std::fs::create_dir_all(proc_root.join("4711")).unwrap();
        std::fs::write(proc_root.join("4711").join("status"), STATUS).unwrap();
        std::fs::write(
            proc_root.join("4711").join("stat"),
            "4711 (sleep) S 1 4711 4711 0 -1 4194560 167 0 0 0 0 0 0 0 \
             20 0 1 0 555123 5611520 200 0 0 0 0 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0",
        )
        .unwrap();
        let group_file = dir.path().join("group");
        std::fs::write(&group_file, "wheel:x:998:\n").unwrap();

        let sys = ProcSystem::with_roots(&proc_root, &group_file);

        let creds = sys.process_credentials(4711).unwrap();
        assert_eq!(creds.uid, 1000);
        assert_eq!(sys.process_start_time(4711).unwrap(), 555_123);
        assert_eq!(sys.group_id("wheel"), Some(998));
        assert_eq!(sys.group_id("nosuch"), None);

        assert!(matches!(
            sys.process_credentials(9999),
            Err(SystemError::UnknownProcess(9999))
        ));
        assert!(matches!(
            sys.peer_credentials(":1.7"),
            Err(SystemError::UnknownPeer(_))
        ));
    }
}
