use cred_resolver::{resolve, SystemAccess};
use policy_store::PolicyStore;
use subject_codec::Subject;
use tracing::debug;

/// Decide whether `subject` may perform `action_id`.
///
/// Fail-closed by construction: an unknown action, any credential resolution
/// failure, and an exhausted group list all produce `false`. No error path
/// can produce `true`, and the function itself performs no I/O beyond the
/// injected [`SystemAccess`] queries.
///
/// Group matching consults the subject's supplementary gids only. The
/// primary gid is never tested, so executing a `setgid` binary (which swaps
/// the primary group) cannot grant a policy-relevant group.
pub fn decide(
    subject: &Subject,
    action_id: &str,
    store: &PolicyStore,
    system: &dyn SystemAccess,
) -> bool {
    let Some(groups) = store.lookup(action_id) else {
        debug!(action_id, "action not present in policy; denying");
        return false;
    };

    let creds = match resolve(subject, system) {
        Ok(creds) => creds,
        Err(err) => {
            debug!(action_id, %subject, error = %err, "credential resolution failed; denying");
            return false;
        }
    };

    for name in groups {
        let Some(gid) = system.group_id(name) else {
            // Groups named in policy but absent from the group database
            // simply cannot match; they never abort the check.
            debug!(group = %name, "configured group has no id; skipping");
            continue;
        };

        if creds.has_supplementary_gid(gid) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use cred_resolver::{ResolvedCredentials, SystemError};
    use std::collections::HashMap;

    struct FakeSystem {
        processes: HashMap<u32, (ResolvedCredentials, u64)>,
        groups: HashMap<String, u32>,
    }

    impl FakeSystem {
        fn new() -> Self {
            Self {
                processes: HashMap::new(),
                groups: HashMap::new(),
            }
        }

        fn with_process(mut self, pid: u32, creds: ResolvedCredentials, start_time: u64) -> Self {
            self.processes.insert(pid, (creds, start_time));
            self
        }

        fn with_group(mut self, name: &str, gid: u32) -> Self {
            self.groups.insert(name.to_string(), gid);
            self
        }
    }

    impl SystemAccess for FakeSystem {
        fn process_credentials(&self, pid: u32) -> Result<ResolvedCredentials, SystemError> {
            self.processes
                .get(&pid)
                .map(|(c, _)| c.clone())
                .ok_or(SystemError::UnknownProcess(pid))
        }

        fn process_start_time(&self, pid: u32) -> Result<u64, SystemError> {
            self.processes
                .get(&pid)
                .map(|(_, t)| *t)
                .ok_or(SystemError::UnknownProcess(pid))
        }

        fn peer_credentials(&self, name: &str) -> Result<ResolvedCredentials, SystemError> {
            Err(SystemError::UnknownPeer(name.to_string()))
        }

        fn group_id(&self, name: &str) -> Option<u32> {
            self.groups.get(name).copied()
        }
    }

    const WHEEL_GID: u32 = 998;
    const ADM_GID: u32 = 4;
    const USERS_GID: u32 = 100;

    fn store() -> PolicyStore {
        policy_store::load_str("org.freedesktop.login1.reboot=\"adm,wheel\"\n").unwrap()
    }

    fn subject() -> Subject {
        Subject::Process {
            pid: 4711,
            start_time: 555,
        }
    }

    fn creds(primary_gid: u32, supplementary: &[u32]) -> ResolvedCredentials {
        ResolvedCredentials {
            uid: 1000,
            euid: 1000,
            primary_gid,
            supplementary_gids: supplementary.to_vec(),
        }
    }

    #[test]
    fn unknown_action_is_denied_regardless_of_subject() {
        let sys = FakeSystem::new()
            .with_process(4711, creds(USERS_GID, &[WHEEL_GID]), 555)
            .with_group("wheel", WHEEL_GID);
        assert!(!decide(&subject(), "org.example.unknown", &store(), &sys));
        assert!(!decide(&subject(), "", &store(), &sys));
    }

    #[test]
    fn supplementary_membership_allows() {
        let sys = FakeSystem::new()
            .with_process(4711, creds(USERS_GID, &[WHEEL_GID]), 555)
            .with_group("adm", ADM_GID)
            .with_group("wheel", WHEEL_GID);
        assert!(decide(&subject(), "org.freedesktop.login1.reboot", &store(), &sys));
    }

    #[test]
    fn primary_only_membership_is_denied() {
        // The only overlap with the configured groups is via the primary
        // gid, which must not count.
        let sys = FakeSystem::new()
            .with_process(4711, creds(WHEEL_GID, &[USERS_GID]), 555)
            .with_group("adm", ADM_GID)
            .with_group("wheel", WHEEL_GID);
        assert!(!decide(&subject(), "org.freedesktop.login1.reboot", &store(), &sys));
    }

    #[test]
    fn supplementary_membership_counts_even_when_it_equals_primary() {
        let sys = FakeSystem::new()
            .with_process(4711, creds(WHEEL_GID, &[WHEEL_GID]), 555)
            .with_group("adm", ADM_GID)
            .with_group("wheel", WHEEL_GID);
        assert!(decide(&subject(), "org.freedesktop.login1.reboot", &store(), &sys));
    }

    #[test]
    fn resolution_failure_is_denied() {
        // Right group membership, wrong start time.
        let sys = FakeSystem::new()
            .with_process(4711, creds(USERS_GID, &[WHEEL_GID]), 556)
            .with_group("wheel", WHEEL_GID);
        assert!(!decide(&subject(), "org.freedesktop.login1.reboot", &store(), &sys));
    }

    #[test]
    fn privilege_mismatch_is_denied_despite_membership() {
        let mut c = creds(USERS_GID, &[WHEEL_GID]);
        c.euid = 0;
        let sys = FakeSystem::new()
            .with_process(4711, c, 555)
            .with_group("wheel", WHEEL_GID);
        assert!(!decide(&subject(), "org.freedesktop.login1.reboot", &store(), &sys));
    }

    #[test]
    fn missing_group_definitions_are_skipped_not_fatal() {
        // "adm" is not in the group database; "wheel" still matches.
        let sys = FakeSystem::new()
            .with_process(4711, creds(USERS_GID, &[WHEEL_GID]), 555)
            .with_group("wheel", WHEEL_GID);
        assert!(decide(&subject(), "org.freedesktop.login1.reboot", &store(), &sys));
    }

    #[test]
    fn no_configured_group_matches_is_denied() {
        let sys = FakeSystem::new()
            .with_process(4711, creds(USERS_GID, &[USERS_GID, 50]), 555)
            .with_group("adm", ADM_GID)
            .with_group("wheel", WHEEL_GID);
        assert!(!decide(&subject(), "org.freedesktop.login1.reboot", &store(), &sys));
    }

    #[test]
    fn session_subject_is_denied() {
        let sys = FakeSystem::new().with_group("wheel", WHEEL_GID);
        let s = Subject::Session {
            session_id: "c2".to_string(),
        };
        assert!(!decide(&s, "org.freedesktop.login1.reboot", &store(), &sys));
    }

    #[test]
    fn decision_is_deterministic() {
        let sys = FakeSystem::new()
            .with_process(4711, creds(USERS_GID, &[WHEEL_GID]), 555)
            .with_group("adm", ADM_GID)
            .with_group("wheel", WHEEL_GID);
        let store = store();
        let first = decide(&subject(), "org.freedesktop.login1.reboot", &store, &sys);
        let second = decide(&subject(), "org.freedesktop.login1.reboot", &store, &sys);
        assert_eq!(first, second);
        assert!(first);
    }
}
