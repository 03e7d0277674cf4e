/// Maximum number of groups that may be attached to a single action id.
pub const MAX_GROUPS: usize = 10;

/// A single parsed policy line before it is merged into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRule {
    pub action_id: String,
    /// Group names in the order they were written.
    pub groups: Vec<String>,
}

/// Ways a single policy line can violate the grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("whitespace is not permitted anywhere in a policy line")]
    Whitespace,

    #[error("missing '=' separator")]
    MissingEquals,

    #[error("action id must not be empty")]
    EmptyActionId,

    #[error("group list must be enclosed in double quotes")]
    MissingOpenQuote,

    #[error("unterminated group list (missing closing '\"')")]
    MissingCloseQuote,

    #[error("trailing characters after the closing '\"'")]
    TrailingCharacters,

    #[error("group name must not be empty")]
    EmptyGroup,

    #[error("too many groups ({0}); at most {MAX_GROUPS} are allowed")]
    TooManyGroups(usize),
}

/// Parse one non-empty, non-comment policy line.
///
/// Grammar: `action-id="group1,group2,...,groupN"` with no whitespace
/// permitted anywhere in the line and at most [`MAX_GROUPS`] groups. The
/// caller is expected to have stripped the trailing newline and to have
/// filtered out blank lines and `#` comments.
pub fn parse_line(line: &str) -> Result<ParsedRule, GrammarError> {
    if line.chars().any(char::is_whitespace) {
        return Err(GrammarError::Whitespace);
    }

    let (action_id, value) = line.split_once('=').ok_or(GrammarError::MissingEquals)?;

    if action_id.is_empty() {
        return Err(GrammarError::EmptyActionId);
    }

    let inner = value
        .strip_prefix('"')
        .ok_or(GrammarError::MissingOpenQuote)?;

    // The closing quote must be the last character of the line.
    let inner = match inner.find('"') {
        Some(pos) if pos == inner.len() - 1 => &inner[..pos],
        Some(_) => return Err(GrammarError::TrailingCharacters),
        None => return Err(GrammarError::MissingCloseQuote),
    };

    let mut groups = Vec::new();
    for group in inner.split(',') {
        if group.is_empty() {
            return Err(GrammarError::EmptyGroup);
        }
        groups.push(group.to_string());
    }

    if groups.len() > MAX_GROUPS {
        return Err(GrammarError::TooManyGroups(groups.len()));
    }

    Ok(ParsedRule {
        action_id: action_id.to_string(),
        groups,
    })
}
