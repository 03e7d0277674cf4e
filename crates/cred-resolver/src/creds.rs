/// Verified OS-level credentials for a subject.
///
/// Produced per request and discarded once the verdict has been computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    /// Real user id.
    pub uid: u32,
    /// Effective user id.
    pub euid: u32,
    /// Primary group id. Deliberately excluded from group matching.
    pub primary_gid: u32,
    /// Supplementary group ids, in the order the OS reports them.
    pub supplementary_gids: Vec<u32>,
}

impl ResolvedCredentials {
    /// Whether `gid` is among the supplementary groups. The primary gid is
    /// never consulted here: group-based authorization must not be reachable
    /// through a `setgid` binary that only changes the primary group.
    pub fn has_supplementary_gid(&self, gid: u32) -> bool {
        self.supplementary_gids.contains(&gid)
    }
}
