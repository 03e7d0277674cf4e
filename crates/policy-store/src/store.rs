use std::collections::HashMap;

use crate::grammar::ParsedRule;

/// Immutable mapping from action id to the ordered list of group names that
/// are permitted to perform it.
///
/// Built once at startup by the loader and never mutated afterwards, so it
/// can be shared freely (e.g. behind an `Arc`) without synchronization.
#[derive(Debug, Default)]
pub struct PolicyStore {
    rules: HashMap<String, Vec<String>>,
}

impl PolicyStore {
    /// Build a store from parsed rules. When the same action id occurs more
    /// than once, the later rule replaces the earlier one (last-write-wins).
    pub(crate) fn from_rules(rules: impl IntoIterator<Item = ParsedRule>) -> Self {
        let mut map = HashMap::new();
        for rule in rules {
            map.insert(rule.action_id, rule.groups);
        }
        Self { rules: map }
    }

    /// Look up the groups configured for an action id.
    ///
    /// Matching is exact string equality; there is no wildcard or prefix
    /// matching. `None` means the action is unknown and must be denied.
    pub fn lookup(&self, action_id: &str) -> Option<&[String]> {
        self.rules.get(action_id).map(Vec::as_slice)
    }

    /// Iterate over every action id in the store (unspecified order).
    pub fn action_ids(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Number of distinct action ids.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
