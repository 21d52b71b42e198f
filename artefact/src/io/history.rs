//! Commit history reader over first-parent history.

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::core::log_format::{LOG_FORMAT, parse_log};
use crate::core::range::{LogQuery, resolve_range};
use crate::core::types::{Commit, CommitFilter, SortOrder};
use crate::error::BuildError;
use crate::io::git::Git;

/// List commits matching `filter`.
///
/// Only first-parent history is walked. When `from` is a hash the `from`
/// commit itself is always part of the result, even though git's range syntax
/// would leave it out. Fails with [`BuildError::EmptyRepository`] when the
/// repository has no commits at all; a filter that matches nothing in a
/// non-empty repository yields an empty list.
#[instrument(skip_all, fields(repo = %git.workdir().display()))]
pub fn list_commits(git: &Git, filter: &CommitFilter) -> Result<Vec<Commit>> {
    let total = git.commit_count()?;
    if total == 0 {
        return Err(BuildError::EmptyRepository {
            path: git.workdir().to_path_buf(),
        }
        .into());
    }

    let query = resolve_range(filter.from.as_ref(), filter.to.as_ref(), total)?;
    debug!(?query, total, "resolved commit range");

    let mut commits = match &query {
        LogQuery::Nothing => Vec::new(),
        LogQuery::Whole { tip } => run_log(git, filter, &[tip.clone()])?,
        LogQuery::Single { rev } => {
            run_log(git, filter, &["--max-count=1".to_string(), rev.clone()])?
        }
        LogQuery::Between { from, to } => {
            let mut list = run_log(git, filter, &[format!("{from}..{to}")])?;
            let from_commit = commit_by_hash(git, from)?;
            if matches_message(&from_commit, filter.message.as_deref()) {
                list.insert(0, from_commit);
            }
            list
        }
        LogQuery::Window { skip, max_count } => run_log(
            git,
            filter,
            &[
                format!("--skip={skip}"),
                format!("--max-count={max_count}"),
                "HEAD".to_string(),
            ],
        )?,
    };

    if filter.order == SortOrder::Desc {
        commits.reverse();
    }
    if let Some(limit) = filter.limit {
        commits.truncate(limit);
    }
    debug!(count = commits.len(), "listed commits");
    Ok(commits)
}

/// Read a single commit by hash or revision.
pub fn commit_by_hash(git: &Git, rev: &str) -> Result<Commit> {
    let out = git
        .log(&["--max-count=1", LOG_FORMAT, "--decorate=short", rev])
        .with_context(|| format!("read commit {rev}"))?;
    let mut commits = parse_log(&out)?;
    if commits.len() != 1 {
        return Err(anyhow!(
            "expected exactly one commit for '{rev}', found {}",
            commits.len()
        ));
    }
    Ok(commits.remove(0))
}

/// Very first commit of first-parent history.
pub fn first_commit(git: &Git) -> Result<Commit> {
    list_commits(git, &CommitFilter::ordinals(1, 1))?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no first commit in {}", git.workdir().display()))
}

/// Most recent commit, optionally the most recent whose message contains `message`.
pub fn last_commit(git: &Git, message: Option<&str>) -> Result<Option<Commit>> {
    let mut filter = CommitFilter::default().order(SortOrder::Desc).limit(1);
    filter.message = message.map(str::to_string);
    Ok(list_commits(git, &filter)?.into_iter().next())
}

fn run_log(git: &Git, filter: &CommitFilter, range_args: &[String]) -> Result<Vec<Commit>> {
    let mut args: Vec<String> = vec![
        "--first-parent".to_string(),
        "--reverse".to_string(),
        "--decorate=short".to_string(),
        LOG_FORMAT.to_string(),
    ];
    if let Some(needle) = &filter.message {
        args.push("--fixed-strings".to_string());
        args.push(format!("--grep={needle}"));
    }
    args.extend(range_args.iter().cloned());
    args.push("--".to_string());

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let out = git.log(&args).with_context(|| {
        format!(
            "unable to get commits with filter {}",
            serde_json::to_string(filter).unwrap_or_default()
        )
    })?;
    Ok(parse_log(&out)?)
}

fn matches_message(commit: &Commit, needle: Option<&str>) -> bool {
    needle.is_none_or(|needle| commit.message().contains(needle))
}
