//! Decide which source tags are new for the artefact.

use crate::core::types::TagMap;
use crate::error::BuildError;

/// Tags to apply to the artefact, sorted by name.
///
/// Starts from the source tags reachable since the baseline, drops any already
/// present on the artefact's last commit (applied by the previous deployment),
/// then compares by name against every artefact tag. `artefact_all` maps each
/// artefact tag to the source commit its artefact commit was built from, so a
/// matching target means the tag was already applied and a different target is
/// a conflict. Conflicts are reported together and nothing is returned for
/// application.
pub fn new_tags(
    source_since_baseline: &TagMap,
    artefact_all: &TagMap,
    artefact_last_commit: &TagMap,
) -> Result<Vec<String>, BuildError> {
    let mut conflicts = Vec::new();
    let mut fresh = Vec::new();

    for (name, target) in source_since_baseline {
        if artefact_last_commit.contains_key(name) {
            continue;
        }
        match artefact_all.get(name) {
            Some(existing) if existing == target => {}
            Some(_) => conflicts.push(name.clone()),
            None => fresh.push(name.clone()),
        }
    }

    if !conflicts.is_empty() {
        return Err(BuildError::TagConflict { tags: conflicts });
    }
    Ok(fresh)
}
