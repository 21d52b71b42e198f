//! Resolve a commit filter's `from`/`to` bounds into a concrete log query.

use crate::core::types::RangeBound;
use crate::error::BuildError;

const HEAD: &str = "HEAD";

/// What `git log --first-parent --reverse` should be asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogQuery {
    /// All history reachable from `tip`.
    Whole { tip: String },
    /// Exactly one commit.
    Single { rev: String },
    /// `from..to`; git omits `from`, so the caller must re-fetch and prepend it.
    Between { from: String, to: String },
    /// Window over `total` commits: skip the newest `skip`, keep `max_count`.
    Window { skip: usize, max_count: usize },
    /// Range selects nothing (e.g. ordinals past the end of history).
    Nothing,
}

/// Resolve bounds against a repository with `total` first-parent commits.
pub fn resolve_range(
    from: Option<&RangeBound>,
    to: Option<&RangeBound>,
    total: usize,
) -> Result<LogQuery, BuildError> {
    let query = match (from, to) {
        (None, None) => LogQuery::Whole {
            tip: HEAD.to_string(),
        },
        (None, Some(RangeBound::Rev(tip))) => LogQuery::Whole { tip: tip.clone() },
        (Some(RangeBound::Rev(from)), None) => revs(from, HEAD),
        (Some(RangeBound::Rev(from)), Some(RangeBound::Rev(to))) => revs(from, to),
        (Some(RangeBound::Ordinal(from)), None) => window(*from, total, total),
        (None, Some(RangeBound::Ordinal(to))) => window(1, *to, total),
        (Some(RangeBound::Ordinal(from)), Some(RangeBound::Ordinal(to))) => {
            window(*from, *to, total)
        }
        (Some(from), Some(to)) => {
            return Err(BuildError::UnsupportedRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
    };
    Ok(query)
}

fn revs(from: &str, to: &str) -> LogQuery {
    if from == to {
        LogQuery::Single {
            rev: from.to_string(),
        }
    } else {
        LogQuery::Between {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

fn window(from: usize, to: usize, total: usize) -> LogQuery {
    let from = from.max(1);
    let to = to.min(total);
    if from > to {
        return LogQuery::Nothing;
    }
    LogQuery::Window {
        skip: total - to,
        max_count: to - from + 1,
    }
}
