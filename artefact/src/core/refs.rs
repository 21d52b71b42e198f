//! Validation of remote locations and branch names.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::BuildError;

static GIT_URI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:git|ssh|https?|[\w.\-]+@[\w.\-]+):(?://)?[\w.@:/~\-]+\.git(?:/?|#[\w.\-]+?)$")
        .unwrap()
});

const FORBIDDEN_SEQUENCES: [&str; 5] = ["..", "/.", "//", "\\", "@{"];
const FORBIDDEN_CHARS: [char; 6] = ['~', '^', ':', '?', '*', '['];
const FORBIDDEN_SUFFIXES: [&str; 3] = [".lock", "/", "."];

/// True if `location` looks like a remote git URI (`ssh://…/repo.git`,
/// `git@host:org/repo.git`, `https://host/repo.git#ref`).
pub fn is_git_uri(location: &str) -> bool {
    GIT_URI_RE.is_match(location)
}

/// Check `name` against git's ref-name rules for branches.
pub fn validate_branch_name(name: &str, what: &'static str) -> Result<(), BuildError> {
    if is_valid_branch_name(name) {
        Ok(())
    } else {
        Err(BuildError::RemoteValidation {
            what,
            value: name.to_string(),
        })
    }
}

fn is_valid_branch_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('/')
        && !FORBIDDEN_SEQUENCES.iter().any(|seq| name.contains(seq))
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_CHARS.contains(&c))
        && !FORBIDDEN_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}
