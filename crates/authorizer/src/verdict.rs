use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The reply triple of a `CheckAuthorization` call.
///
/// Challenge (interactive) authorization is not supported, so `is_challenge`
/// is always false and `details` is always empty; they exist to keep the
/// reply shape wire-compatible with PolicyKit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_authorized: bool,
    pub is_challenge: bool,
    pub details: HashMap<String, String>,
}

impl Verdict {
    pub fn allowed() -> Self {
        Self {
            is_authorized: true,
            is_challenge: false,
            details: HashMap::new(),
        }
    }

    pub fn denied() -> Self {
        Self {
            is_authorized: false,
            is_challenge: false,
            details: HashMap::new(),
        }
    }

    pub fn from_decision(is_authorized: bool) -> Self {
        if is_authorized {
            Self::allowed()
        } else {
            Self::denied()
        }
    }
}
