//! Parser for artefact map files.
//!
//! ```text
//! # comment
//! docroot/:web/
//! composer.json:config/
//! !docroot/sites/default/files
//! ```

use std::collections::HashSet;
use std::path::Path;

use crate::error::BuildError;

const KEY_VALUE_DELIMITER: char = ':';
const COMMENT_PREFIX: char = '#';
const NEGATE_PREFIX: char = '!';

/// One positive `source[:destination]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    /// Path relative to the source directory.
    pub source: String,
    /// Path relative to the artefact directory. A trailing `/` marks a
    /// directory that a single mapped file is copied into.
    pub destination: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapFile {
    pub mappings: Vec<PathMapping>,
    /// Source-relative paths from `!` lines, in file order.
    pub exclusions: Vec<String>,
}

/// Parse map file contents. `path` is only used in error messages.
pub fn parse_map_file(contents: &str, path: &Path) -> Result<MapFile, BuildError> {
    let mut map = MapFile::default();
    let mut seen = HashSet::new();

    for (idx, raw) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with(COMMENT_PREFIX) {
            continue;
        }

        let (key, value) = match line.split_once(KEY_VALUE_DELIMITER) {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (line.trim(), ""),
        };

        if let Some(excluded) = key.strip_prefix(NEGATE_PREFIX) {
            let excluded = normalize(excluded);
            if excluded.is_empty() {
                return Err(invalid(path, line_no, "empty exclusion"));
            }
            map.exclusions.push(excluded.to_string());
            continue;
        }

        if key.is_empty() {
            return Err(invalid(path, line_no, "empty source path"));
        }
        if !seen.insert(normalize(key).to_string()) {
            return Err(invalid(
                path,
                line_no,
                &format!("source path '{key}' is mapped more than once"),
            ));
        }
        let destination = if value.is_empty() { key } else { value };
        map.mappings.push(PathMapping {
            source: key.to_string(),
            destination: destination.to_string(),
        });
    }

    Ok(map)
}

/// Strip `./` prefixes and trailing separators so equivalent spellings compare equal.
pub fn normalize(path: &str) -> &str {
    let mut path = path.trim();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path.trim_end_matches('/')
}

fn invalid(path: &Path, line: usize, reason: &str) -> BuildError {
    BuildError::InvalidMapFile {
        path: path.to_path_buf(),
        line,
        reason: reason.to_string(),
    }
}
