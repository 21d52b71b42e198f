//! Shared value types for history, tags, and commit queries.
//!
//! Commits and tags are re-read from live repository state on every run and
//! never cached.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A commit read from first-parent history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Full object hash.
    pub hash: String,
    /// Committer unix timestamp.
    pub timestamp: i64,
    pub subject: String,
    /// Message body after the subject line (trimmed).
    pub description: String,
    /// Tag names decorating this commit, in git's decoration order.
    pub tags: Vec<String>,
}

impl Commit {
    /// First `len` characters of the hash.
    pub fn short_hash(&self, len: usize) -> &str {
        let end = self.hash.len().min(len);
        &self.hash[..end]
    }

    /// Subject and body joined the way git stores them.
    pub fn message(&self) -> String {
        if self.description.is_empty() {
            self.subject.clone()
        } else {
            format!("{}\n\n{}", self.subject, self.description)
        }
    }
}

/// Tag name -> target commit hash.
pub type TagMap = BTreeMap<String, String>;

/// Position order of returned commits (by position in history, not by date).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// One end of a commit range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RangeBound {
    /// 1-based position counted from the start of first-parent history.
    Ordinal(usize),
    /// Any revision git accepts (usually a full hash, or `HEAD`).
    Rev(String),
}

impl fmt::Display for RangeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeBound::Ordinal(n) => write!(f, "#{n}"),
            RangeBound::Rev(rev) => f.write_str(rev),
        }
    }
}

/// Query for `list_commits`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitFilter {
    /// Start of the range, inclusive. `None` means the first commit.
    pub from: Option<RangeBound>,
    /// End of the range, inclusive. `None` means `HEAD`.
    pub to: Option<RangeBound>,
    /// Keep only the first `limit` commits after ordering.
    pub limit: Option<usize>,
    pub order: SortOrder,
    /// Substring that must appear in the commit message.
    pub message: Option<String>,
}

impl CommitFilter {
    /// Commits from `hash` (inclusive) up to `HEAD`.
    pub fn since(hash: impl Into<String>) -> Self {
        Self {
            from: Some(RangeBound::Rev(hash.into())),
            ..Self::default()
        }
    }

    /// Commits between two 1-based positions, inclusive.
    pub fn ordinals(from: usize, to: usize) -> Self {
        Self {
            from: Some(RangeBound::Ordinal(from)),
            to: Some(RangeBound::Ordinal(to)),
            ..Self::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn message(mut self, needle: impl Into<String>) -> Self {
        self.message = Some(needle.into());
        self
    }
}
