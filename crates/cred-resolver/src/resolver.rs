use subject_codec::Subject;
use tracing::debug;

use crate::creds::ResolvedCredentials;
use crate::system::{SystemAccess, SystemError};

/// Why a subject could not be resolved to verified credentials.
///
/// None of these are surfaced as protocol errors; the evaluator absorbs every
/// resolution failure into a denial.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("claimed start time does not match the process record")]
    StartTimeMismatch,

    #[error("real uid {uid} differs from effective uid {euid}")]
    PrivilegeMismatch { uid: u32, euid: u32 },

    #[error("session subjects are not supported")]
    UnsupportedSubjectKind,

    #[error(transparent)]
    System(#[from] SystemError),
}

/// Resolve a decoded subject to verified OS credentials.
///
/// Two anti-spoofing checks apply:
///
/// * For process subjects the claimed start time is compared against the
///   OS's own record for that pid. A stale pid from an exited process cannot
///   pass this check, which defeats pid-reuse attacks. Inability to read the
///   record counts as a mismatch.
/// * For every supported subject kind the real uid must equal the effective
///   uid, so a caller cannot borrow a different group set by re-execing
///   through a setuid binary.
pub fn resolve(
    subject: &Subject,
    system: &dyn SystemAccess,
) -> Result<ResolvedCredentials, ResolveError> {
    let creds = match subject {
        Subject::Process { pid, start_time } => {
            let creds = system.process_credentials(*pid)?;

            let recorded = system.process_start_time(*pid).map_err(|e| {
                debug!(pid, error = %e, "start-time record unreadable");
                ResolveError::StartTimeMismatch
            })?;
            if recorded != *start_time {
                debug!(pid, claimed = start_time, recorded, "start-time mismatch");
                return Err(ResolveError::StartTimeMismatch);
            }

            creds
        }
        Subject::BusPeer { name } => system.peer_credentials(name)?,
        Subject::Session { .. } => return Err(ResolveError::UnsupportedSubjectKind),
    };

    if creds.uid != creds.euid {
        return Err(ResolveError::PrivilegeMismatch {
            uid: creds.uid,
            euid: creds.euid,
        });
    }

    Ok(creds)
}
