use serde::{Deserialize, Serialize};

/// One completed `CheckAuthorization` decision, recorded as a JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub id: uuid::Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Human-readable subject summary, e.g.
    /// `unix process (pid: 4711, start time: 555123)`.
    pub subject: String,
    pub action_id: String,
    pub allowed: bool,
    /// Transport peer name of the caller, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
}

impl DecisionEntry {
    /// Create an entry with an auto-generated UUID v4 and the current UTC
    /// timestamp.
    pub fn new(subject: impl Into<String>, action_id: impl Into<String>, allowed: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            subject: subject.into(),
            action_id: action_id.into(),
            allowed,
            peer: None,
        }
    }

    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = Some(peer.into());
        self
    }
}
