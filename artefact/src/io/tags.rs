//! Tag resolver: tag names mapped to the commits they ultimately point at.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, warn};

use crate::core::types::{CommitFilter, TagMap};
use crate::io::git::Git;
use crate::io::history::{last_commit, list_commits};

/// All tags in the repository, annotated tags peeled to their commit.
///
/// An empty repository has no tags; this is not an error.
pub fn list_tags(git: &Git) -> Result<TagMap> {
    if !git.has_commits()? {
        return Ok(TagMap::new());
    }
    let mut tags = TagMap::new();
    for tag_ref in git.tag_refs()? {
        let hash = match tag_ref.commit_hash() {
            Some(hash) => hash.to_string(),
            None => match git.resolve_commit(&format!("refs/tags/{}", tag_ref.name))? {
                Some(hash) => hash,
                None => {
                    warn!(tag = %tag_ref.name, kind = %tag_ref.object_type, "tag does not point at a commit, ignoring");
                    continue;
                }
            },
        };
        tags.insert(tag_ref.name, hash);
    }
    debug!(count = tags.len(), repo = %git.workdir().display(), "listed tags");
    Ok(tags)
}

/// Tags whose commit lies in first-parent history from `baseline` to HEAD.
pub fn tags_reachable_since(git: &Git, baseline: &str) -> Result<TagMap> {
    let commits = list_commits(git, &CommitFilter::since(baseline))?;
    let hashes: HashSet<&str> = commits.iter().map(|c| c.hash.as_str()).collect();
    Ok(list_tags(git)?
        .into_iter()
        .filter(|(_, hash)| hashes.contains(hash.as_str()))
        .collect())
}

/// Tags attached to the most recent commit.
pub fn tags_on_last_commit(git: &Git) -> Result<TagMap> {
    if !git.has_commits()? {
        return Ok(TagMap::new());
    }
    let Some(last) = last_commit(git, None)? else {
        return Ok(TagMap::new());
    };
    Ok(list_tags(git)?
        .into_iter()
        .filter(|(_, hash)| *hash == last.hash)
        .collect())
}
