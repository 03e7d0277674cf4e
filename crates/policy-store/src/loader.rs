use std::path::{Path, PathBuf};

use tracing::debug;

use crate::grammar::{parse_line, GrammarError, ParsedRule};
use crate::store::PolicyStore;

/// A policy source that could not be loaded. Fatal at startup: no partial
/// store is ever produced and the daemon must not begin serving requests.
#[derive(Debug, thiserror::Error)]
pub enum PolicyLoadError {
    #[error("failed to read policy source {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}:{line}: {source}")]
    Grammar {
        path: PathBuf,
        line: usize,
        source: GrammarError,
    },
}

/// Load a [`PolicyStore`] from a policy file, or from a flat directory of
/// policy files.
///
/// Directory loading is non-recursive: subdirectories are skipped. Files are
/// parsed in lexicographic file-name order so that merging is deterministic;
/// when two files define the same action id, the later file wins.
pub fn load_path(path: impl AsRef<Path>) -> Result<PolicyStore, PolicyLoadError> {
    let path = path.as_ref();

    let meta = std::fs::metadata(path).map_err(|source| PolicyLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if meta.is_dir() {
        load_dir(path)
    } else {
        let rules = parse_file(path)?;
        Ok(PolicyStore::from_rules(rules))
    }
}

/// Parse a policy document from a string. Primarily used by tests and by the
/// file loader.
pub fn load_str(text: &str) -> Result<PolicyStore, PolicyLoadError> {
    let rules = parse_source(text, Path::new("<memory>"))?;
    Ok(PolicyStore::from_rules(rules))
}

fn load_dir(dir: &Path) -> Result<PolicyStore, PolicyLoadError> {
    let entries = std::fs::read_dir(dir).map_err(|source| PolicyLoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| PolicyLoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }

    // Deterministic merge order: lexicographic by file name.
    files.sort();

    let mut rules: Vec<ParsedRule> = Vec::new();
    for file in &files {
        debug!(file = %file.display(), "loading policy file");
        rules.extend(parse_file(file)?);
    }

    Ok(PolicyStore::from_rules(rules))
}

fn parse_file(path: &Path) -> Result<Vec<ParsedRule>, PolicyLoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| PolicyLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_source(&text, path)
}

/// Parse every rule line in a policy document. Blank lines and `#` comments
/// are skipped; any other line must satisfy the grammar or the whole load
/// fails.
fn parse_source(text: &str, path: &Path) -> Result<Vec<ParsedRule>, PolicyLoadError> {
    let mut rules = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }

        let rule = parse_line(raw).map_err(|source| PolicyLoadError::Grammar {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        rules.push(rule);
    }

    Ok(rules)
}
