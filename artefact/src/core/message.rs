//! Artefact commit messages and the provenance marker they carry.

use std::sync::LazyLock;

use chrono::{DateTime, TimeZone};
use regex::Regex;

use crate::core::types::Commit;

/// Prefix of the line recording which source commit an artefact commit holds.
pub const PROVENANCE_PREFIX: &str = "Source commit: ";

const COMMITS_HEADER: &str = "Commits since last artefact build:";
const DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
const SHORT_HASH_LEN: usize = 8;

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{}([0-9a-f]+)", regex::escape(PROVENANCE_PREFIX)))
        .unwrap()
});

/// Render the artefact commit message.
///
/// ```text
/// Deployment commit on 2024/01/31 10:00:00
///
/// Source commit: <hash>
///
/// Commits since last artefact build:
///
/// Subject (1234abcd)
/// ```
pub fn build_message<Tz: TimeZone>(
    now: &DateTime<Tz>,
    last_source_commit: &Commit,
    commits: &[Commit],
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut message = format!("Deployment commit on {}", now.format(DATE_FORMAT));
    message.push_str("\n\n");
    message.push_str(PROVENANCE_PREFIX);
    message.push_str(&last_source_commit.hash);
    message.push('\n');
    if !commits.is_empty() {
        message.push('\n');
        message.push_str(COMMITS_HEADER);
        message.push_str("\n\n");
        let lines: Vec<String> = commits
            .iter()
            .map(|c| format!("{} ({})", c.subject, c.short_hash(SHORT_HASH_LEN)))
            .collect();
        message.push_str(&lines.join("\n"));
    }
    message
}

/// Commits to list in a message, oldest first.
///
/// `since_baseline` is the ascending history starting at (and including) the
/// baseline. The baseline itself was already deployed and is dropped, unless it
/// is the very first source commit: that commit is never "after" anything, so
/// it is only ever listed by the first deployment. Returns `None` when nothing
/// is newer than the baseline.
pub fn commits_for_message(
    baseline: &Commit,
    since_baseline: &[Commit],
    first_source_hash: &str,
) -> Option<Vec<Commit>> {
    let newer: Vec<Commit> = since_baseline
        .iter()
        .skip_while(|c| c.hash != baseline.hash)
        .skip(1)
        .cloned()
        .collect();
    if newer.is_empty() {
        return None;
    }
    let mut commits = Vec::with_capacity(newer.len() + 1);
    if baseline.hash == first_source_hash {
        commits.push(baseline.clone());
    }
    commits.extend(newer);
    Some(commits)
}

/// Hash recorded after [`PROVENANCE_PREFIX`] anywhere in `message`.
pub fn extract_marker(message: &str) -> Option<String> {
    MARKER_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
