//! Working-directory and cleanup management for the artefact tree.

use std::cell::Cell;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

/// Serialises process-wide directory changes across threads.
static CWD_LOCK: Mutex<()> = Mutex::new(());

thread_local! {
    static CWD_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Changes the process working directory and restores the previous one on drop.
///
/// Guards nest: only the outermost guard on a thread holds the process-wide
/// lock, and inner guards restore to the directory their parent entered.
#[derive(Debug)]
pub struct CwdGuard {
    previous: PathBuf,
    _lock: Option<MutexGuard<'static, ()>>,
}

impl CwdGuard {
    pub fn enter(dir: &Path) -> Result<Self> {
        let lock = if CWD_DEPTH.get() == 0 {
            Some(CWD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
        } else {
            None
        };
        let previous = env::current_dir().context("read current directory")?;
        env::set_current_dir(dir)
            .with_context(|| format!("change directory to {}", dir.display()))?;
        CWD_DEPTH.set(CWD_DEPTH.get() + 1);
        debug!(from = %previous.display(), to = %dir.display(), "entered directory");
        Ok(Self {
            previous,
            _lock: lock,
        })
    }

    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        if let Err(err) = env::set_current_dir(&self.previous) {
            warn!(dir = %self.previous.display(), %err, "failed to restore working directory");
        }
        CWD_DEPTH.set(CWD_DEPTH.get().saturating_sub(1));
    }
}

/// Removes a directory when dropped, if armed.
///
/// Runs on every exit path of the scope holding it. A failed removal is
/// logged and never replaces the error already propagating.
#[derive(Debug)]
pub struct CleanupGuard {
    dir: PathBuf,
    armed: bool,
}

impl CleanupGuard {
    pub fn new(dir: impl Into<PathBuf>, armed: bool) -> Self {
        Self {
            dir: dir.into(),
            armed,
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.armed || !self.dir.exists() {
            return;
        }
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => info!(dir = %self.dir.display(), "artefact directory removed"),
            Err(err) => {
                error!(dir = %self.dir.display(), %err, "failed to remove artefact directory");
            }
        }
    }
}

/// Create `dir` if needed and remove everything inside it.
pub fn prepare_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    clean_dir(dir, &[])
}

/// Remove every entry in `dir` except those named in `keep`.
pub fn clean_dir(dir: &Path, keep: &[&str]) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("read directory {}", dir.display()))?;
    let mut removed = 0usize;
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let name = entry.file_name();
        if keep.iter().any(|k| name.to_str() == Some(*k)) {
            continue;
        }
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", path.display()))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        }
        .with_context(|| format!("remove {}", path.display()))?;
        removed += 1;
    }
    debug!(dir = %dir.display(), removed, "cleaned directory");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cwd_guard_restores_on_drop_and_on_error_paths() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().canonicalize().expect("canonical");
        let work = root.join("work");
        let nested = work.join("nested");
        fs::create_dir_all(&nested).expect("mkdir");

        let _held = CwdGuard::enter(&root).expect("enter root");
        let result = (|| -> Result<()> {
            let _outer = CwdGuard::enter(&work)?;
            assert_eq!(env::current_dir()?, work);
            {
                let inner = CwdGuard::enter(&nested)?;
                assert_eq!(inner.previous(), work.as_path());
                assert_eq!(env::current_dir()?, nested);
            }
            assert_eq!(env::current_dir()?, work);
            anyhow::bail!("stage failed")
        })();

        assert!(result.is_err());
        assert_eq!(env::current_dir().expect("cwd"), root);
    }

    #[test]
    fn cwd_guard_fails_for_missing_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(CwdGuard::enter(&temp.path().join("missing")).is_err());
    }

    #[test]
    fn cleanup_guard_removes_only_when_armed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let kept = temp.path().join("kept");
        let removed = temp.path().join("removed");
        fs::create_dir_all(kept.join("sub")).expect("mkdir");
        fs::create_dir_all(removed.join("sub")).expect("mkdir");

        drop(CleanupGuard::new(&kept, false));
        assert!(kept.exists());

        drop(CleanupGuard::new(&removed, true));
        assert!(!removed.exists());
    }

    #[test]
    fn clean_dir_keeps_named_entries() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path();
        fs::create_dir_all(dir.join(".git/objects")).expect("mkdir");
        fs::create_dir_all(dir.join("web/core")).expect("mkdir");
        fs::write(dir.join("composer.json"), "{}").expect("write");

        clean_dir(dir, &[".git"]).expect("clean");
        let names: Vec<String> = fs::read_dir(dir)
            .expect("read")
            .map(|e| e.expect("entry").file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![".git"]);

        prepare_dir(dir).expect("prepare");
        assert_eq!(fs::read_dir(dir).expect("read").count(), 0);
    }

    #[test]
    fn prepare_dir_creates_missing_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("a/b");
        prepare_dir(&dir).expect("prepare");
        assert!(dir.is_dir());
    }
}
