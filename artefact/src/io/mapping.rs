//! File mapping engine: materialise the artefact tree from the source tree.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::core::map_file::{PathMapping, normalize, parse_map_file};
use crate::error::BuildError;

/// Paths skipped while copying.
///
/// An entry matches a copied path by basename, by path relative to the
/// directory being mirrored, or by path relative to the source root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions {
    entries: Vec<String>,
    paths: Vec<PathBuf>,
}

impl Exclusions {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exclusions = Self::default();
        exclusions.extend(entries);
        exclusions
    }

    pub fn extend<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for entry in entries {
            let entry = normalize(entry.as_ref());
            if !entry.is_empty() && !self.entries.iter().any(|e| e == entry) {
                self.entries.push(entry.to_string());
            }
        }
    }

    /// Also skip exactly this absolute path.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    fn matches_path(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    fn matches(&self, candidates: &[&str]) -> bool {
        self.entries
            .iter()
            .any(|entry| candidates.iter().any(|c| c == entry))
    }
}

/// Copy `source` into `destination`, optionally through a map file.
///
/// Without a map file the whole source tree is mirrored. With one, only the
/// mapped paths are copied; `!` entries join `base_exclusions` before any
/// copy starts.
#[instrument(skip_all, fields(source = %source.display(), destination = %destination.display()))]
pub fn materialize(
    source: &Path,
    destination: &Path,
    map_file: Option<&Path>,
    base_exclusions: &Exclusions,
) -> Result<()> {
    let Some(map_path) = map_file else {
        copy_dir(source, source, destination, base_exclusions)?;
        info!("copied source tree into artefact");
        return Ok(());
    };

    let contents = fs::read_to_string(map_path)
        .with_context(|| format!("read map file {}", map_path.display()))?;
    let map = parse_map_file(&contents, map_path)?;
    let mut exclusions = base_exclusions.clone();
    exclusions.extend(&map.exclusions);
    debug!(
        mappings = map.mappings.len(),
        exclusions = map.exclusions.len(),
        "parsed map file"
    );

    for mapping in &map.mappings {
        apply_mapping(source, destination, mapping, &exclusions)?;
    }
    info!(mappings = map.mappings.len(), "copied mapped paths into artefact");
    Ok(())
}

fn apply_mapping(
    source_root: &Path,
    destination_root: &Path,
    mapping: &PathMapping,
    exclusions: &Exclusions,
) -> Result<()> {
    let relative = normalize(&mapping.source);
    let from = source_root.join(relative);
    let to = destination_root.join(&mapping.destination);

    let Ok(meta) = fs::symlink_metadata(&from) else {
        return Err(BuildError::MissingSourcePath { path: from }.into());
    };

    let basename = from
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if exclusions.matches_path(&from) || exclusions.matches(&[relative, basename.as_str()]) {
        debug!(path = relative, "mapped path is excluded");
        return Ok(());
    }

    // A symlinked key is recreated as a link, never followed.
    if meta.is_dir() {
        debug!(from = %from.display(), to = %to.display(), "mapping directory");
        return copy_dir(source_root, &from, &to, exclusions);
    }

    let target = if mapping.destination.ends_with('/') {
        create_dir(&to, &from)?;
        to.join(&basename)
    } else {
        if let Some(parent) = to.parent() {
            create_dir(parent, &from)?;
        }
        to
    };
    debug!(
        from = %from.display(),
        to = %target.display(),
        link = meta.file_type().is_symlink(),
        "mapping file"
    );
    copy_entry(&from, &target)
}

/// Mirror `from` into `to`, skipping excluded entries and keeping symlinks as links.
fn copy_dir(source_root: &Path, from: &Path, to: &Path, exclusions: &Exclusions) -> Result<()> {
    create_dir(to, from)?;

    let walker = WalkDir::new(from)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry.path(), source_root, from, exclusions));

    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", from.display()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .with_context(|| format!("relativise {}", entry.path().display()))?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            create_dir(&target, entry.path())?;
        } else {
            copy_entry(entry.path(), &target)?;
        }
    }
    debug!(from = %from.display(), to = %to.display(), "directory copied");
    Ok(())
}

fn is_excluded(path: &Path, source_root: &Path, copy_root: &Path, exclusions: &Exclusions) -> bool {
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let relative_to_copy = slash_path(path.strip_prefix(copy_root).ok());
    let relative_to_source = slash_path(path.strip_prefix(source_root).ok());
    exclusions.matches_path(path)
        || exclusions.matches(&[
            basename.as_str(),
            relative_to_copy.as_str(),
            relative_to_source.as_str(),
        ])
}

fn slash_path(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return String::new();
    };
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Copy one file or symlink, replacing whatever is at `to`.
fn copy_entry(from: &Path, to: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(from).map_err(|source| copy_failed(from, to, source))?;
    if meta.file_type().is_symlink() {
        let target = fs::read_link(from).map_err(|source| copy_failed(from, to, source))?;
        if fs::symlink_metadata(to).is_ok() {
            fs::remove_file(to).map_err(|source| copy_failed(from, to, source))?;
        }
        create_symlink(&target, to, from).map_err(|source| copy_failed(from, to, source))?;
        return Ok(());
    }
    fs::copy(from, to).map_err(|source| copy_failed(from, to, source))?;
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path, _original: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path, original: &Path) -> std::io::Result<()> {
    if original.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

fn create_dir(dir: &Path, for_source: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| copy_failed(for_source, dir, source))?;
    Ok(())
}

fn copy_failed(from: &Path, to: &Path, source: std::io::Error) -> anyhow::Error {
    BuildError::CopyFailed {
        from: PathBuf::from(from),
        to: PathBuf::from(to),
        source,
    }
    .into()
}
