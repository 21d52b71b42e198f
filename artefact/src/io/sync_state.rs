//! Sync state: which source commit the artefact already reflects.
//!
//! Nothing is stored outside git. The state is recovered on every run by
//! scanning the artefact's history for the newest provenance marker.

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument};

use crate::core::message::{PROVENANCE_PREFIX, extract_marker};
use crate::core::types::{Commit, CommitFilter, SortOrder, TagMap};
use crate::error::BuildError;
use crate::io::git::Git;
use crate::io::history::{commit_by_hash, first_commit, last_commit, list_commits};

/// Source hash recorded by the newest artefact commit carrying a marker.
pub fn last_recorded_source_hash(artefact: &Git) -> Result<Option<String>> {
    if !artefact.has_commits()? {
        debug!("artefact has no commits yet");
        return Ok(None);
    }
    let Some(commit) = last_commit(artefact, Some(PROVENANCE_PREFIX))? else {
        debug!("no provenance marker in artefact history");
        return Ok(None);
    };
    Ok(extract_marker(&commit.message()))
}

/// Latest source commit already deployed to the artefact.
///
/// Falls back to the first source commit when the artefact has never been
/// deployed to. Fails with [`BuildError::ProvenanceNotResolvable`] when the
/// recorded hash is unknown to the source repository.
#[instrument(skip_all, fields(source = %source.workdir().display(), artefact = %artefact.workdir().display()))]
pub fn latest_synced_commit(source: &Git, artefact: &Git) -> Result<Commit> {
    let commit = match last_recorded_source_hash(artefact)? {
        Some(hash) => {
            if source.resolve_commit(&hash)?.is_none() {
                return Err(BuildError::ProvenanceNotResolvable {
                    hash,
                    source_dir: source.workdir().to_path_buf(),
                }
                .into());
            }
            list_commits(
                source,
                &CommitFilter::since(hash.as_str())
                    .limit(1)
                    .order(SortOrder::Asc),
            )?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("source commit {hash} not found in first-parent history"))?
        }
        None => first_commit(source)?,
    };
    info!(hash = %commit.hash, "using baseline source commit");
    Ok(commit)
}

/// Re-point artefact tags at the source commits their artefact commits record.
///
/// A tag on a commit without a provenance marker keeps its artefact hash.
pub fn recorded_source_targets(artefact: &Git, tags: &TagMap) -> Result<TagMap> {
    let mut translated = TagMap::new();
    for (name, hash) in tags {
        let commit = commit_by_hash(artefact, hash)?;
        let target = extract_marker(&commit.message()).unwrap_or_else(|| hash.clone());
        debug!(tag = %name, artefact = %hash, source = %target, "resolved tag target");
        translated.insert(name.clone(), target);
    }
    Ok(translated)
}
