//! Fixed-delimiter protocol for reading git output.
//!
//! Fields are separated by ASCII unit separator (0x1f) and log records are
//! terminated by ASCII record separator (0x1e). Both are requested through
//! git's `%x1f`/`%1f` escapes, so free-text fields (subjects, bodies) cannot
//! collide with the delimiters in practice. The parsers reject any record
//! with an unexpected field count instead of guessing.

use crate::core::types::Commit;
use crate::error::BuildError;

pub const FIELD_SEP: char = '\x1f';
pub const RECORD_SEP: char = '\x1e';

/// `--format` argument for `git log`: hash, timestamp, subject, body, refs.
pub const LOG_FORMAT: &str = "--format=%H%x1f%ct%x1f%s%x1f%b%x1f%D%x1e";

/// `--format` argument for `git for-each-ref refs/tags`.
pub const TAG_REF_FORMAT: &str = "--format=%(refname:strip=2)%1f%(objecttype)%1f%(objectname)%1f%(*objecttype)%1f%(*objectname)";

const LOG_FIELDS: usize = 5;
const TAG_REF_FIELDS: usize = 5;
const DECORATION_TAG_PREFIX: &str = "tag: ";

/// Parse `git log` output produced with [`LOG_FORMAT`].
pub fn parse_log(output: &str) -> Result<Vec<Commit>, BuildError> {
    let mut commits = Vec::new();
    for record in output.split(RECORD_SEP) {
        let record = record.trim_start_matches(['\n', '\r']);
        if record.trim().is_empty() {
            continue;
        }
        commits.push(parse_log_record(record)?);
    }
    Ok(commits)
}

fn parse_log_record(record: &str) -> Result<Commit, BuildError> {
    let fields: Vec<&str> = record.split(FIELD_SEP).collect();
    if fields.len() != LOG_FIELDS {
        return Err(BuildError::MalformedOutput {
            purpose: "reading commit history",
            detail: format!(
                "expected {LOG_FIELDS} fields, found {} in record {:?}",
                fields.len(),
                record
            ),
        });
    }

    let hash = fields[0].trim();
    if !is_object_hash(hash) {
        return Err(BuildError::MalformedOutput {
            purpose: "reading commit history",
            detail: format!("invalid commit hash {hash:?}"),
        });
    }
    let timestamp = fields[1]
        .trim()
        .parse::<i64>()
        .map_err(|_| BuildError::MalformedOutput {
            purpose: "reading commit history",
            detail: format!("invalid commit timestamp {:?} for {hash}", fields[1]),
        })?;

    Ok(Commit {
        hash: hash.to_string(),
        timestamp,
        subject: fields[2].trim().to_string(),
        description: fields[3].trim().to_string(),
        tags: parse_decoration_tags(fields[4]),
    })
}

/// Extract tag names from a `%D` decoration list such as
/// `HEAD -> main, tag: v1.0, origin/main`.
pub fn parse_decoration_tags(decoration: &str) -> Vec<String> {
    decoration
        .split(',')
        .filter_map(|item| item.trim().strip_prefix(DECORATION_TAG_PREFIX))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// One line of `git for-each-ref refs/tags` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub name: String,
    pub object_type: String,
    pub object: String,
    /// Type and hash of the object an annotated tag points to.
    pub peeled: Option<(String, String)>,
}

impl TagRef {
    /// Commit this tag resolves to without further lookups, if known.
    ///
    /// Lightweight tags point at the commit directly; annotated tags point at
    /// a tag object whose target is the commit. Tags of tags (or of trees and
    /// blobs) return `None` and need a `^{commit}` lookup.
    pub fn commit_hash(&self) -> Option<&str> {
        match (self.object_type.as_str(), &self.peeled) {
            ("commit", _) => Some(&self.object),
            ("tag", Some((kind, hash))) if kind == "commit" => Some(hash),
            _ => None,
        }
    }
}

/// Parse `git for-each-ref` output produced with [`TAG_REF_FORMAT`].
pub fn parse_tag_refs(output: &str) -> Result<Vec<TagRef>, BuildError> {
    let mut refs = Vec::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(FIELD_SEP).collect();
        if fields.len() != TAG_REF_FIELDS {
            return Err(BuildError::MalformedOutput {
                purpose: "reading tags",
                detail: format!(
                    "expected {TAG_REF_FIELDS} fields, found {} in line {line:?}",
                    fields.len()
                ),
            });
        }
        let name = fields[0].trim();
        let object = fields[2].trim();
        if name.is_empty() || !is_object_hash(object) {
            return Err(BuildError::MalformedOutput {
                purpose: "reading tags",
                detail: format!("invalid tag line {line:?}"),
            });
        }
        let peeled_type = fields[3].trim();
        let peeled_hash = fields[4].trim();
        let peeled = (!peeled_type.is_empty() && !peeled_hash.is_empty())
            .then(|| (peeled_type.to_string(), peeled_hash.to_string()));
        refs.push(TagRef {
            name: name.to_string(),
            object_type: fields[1].trim().to_string(),
            object: object.to_string(),
            peeled,
        });
    }
    Ok(refs)
}

/// SHA-1 (40) or SHA-256 (64) lowercase hex object name.
pub fn is_object_hash(value: &str) -> bool {
    matches!(value.len(), 40 | 64)
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
