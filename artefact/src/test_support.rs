//! Test-only helpers for building throwaway git repositories.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use tempfile::TempDir;

use crate::io::git::{Git, GitIdentity};

/// Identity used for every commit made by tests and test builds.
pub fn test_identity() -> GitIdentity {
    GitIdentity {
        name: "Artefact Test".to_string(),
        email: "artefact-test@local.invalid".to_string(),
    }
}

/// A non-bare repository in a temp dir on branch `main`.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp repo dir")?;
        let repo = Self { dir };
        repo.run(&["init", "--quiet"])?;
        repo.run(&["symbolic-ref", "HEAD", "refs/heads/main"])?;
        let identity = test_identity();
        repo.run(&["config", "user.name", &identity.name])?;
        repo.run(&["config", "user.email", &identity.email])?;
        repo.run(&["config", "commit.gpgsign", "false"])?;
        repo.run(&["config", "tag.gpgsign", "false"])?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn git(&self) -> Git {
        Git::new(self.path()).with_identity(Some(test_identity()))
    }

    /// Write a file relative to the repo root, creating parent directories.
    pub fn write_file(&self, rel: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Write a file, stage everything, commit, and return the new HEAD hash.
    pub fn commit_file(&self, rel: &str, contents: &str, message: &str) -> Result<String> {
        self.write_file(rel, contents)?;
        self.commit_all(message)
    }

    /// Stage everything and commit, returning the new HEAD hash.
    pub fn commit_all(&self, message: &str) -> Result<String> {
        self.run(&["add", "--all"])?;
        self.run(&["commit", "--quiet", "--allow-empty", "-m", message])?;
        self.head()
    }

    pub fn head(&self) -> Result<String> {
        Ok(self.run(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    pub fn tag(&self, name: &str) -> Result<()> {
        self.run(&["tag", name])?;
        Ok(())
    }

    pub fn tag_annotated(&self, name: &str, message: &str) -> Result<()> {
        self.run(&["tag", "-a", name, "-m", message])?;
        Ok(())
    }

    /// Run git in the repo and return stdout.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        run_git(self.path(), args)
    }
}

/// A bare repository standing in for the artefact remote.
pub struct TestRemote {
    dir: TempDir,
}

impl TestRemote {
    /// Bare remote whose only branch `branch` holds a single seed commit.
    pub fn with_branch(branch: &str) -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp remote dir")?;
        run_git(dir.path(), &["init", "--bare", "--quiet"])?;
        let remote = Self { dir };
        let seed = TestRepo::new()?;
        seed.commit_file("README.md", "artefact repository\n", "Initial artefact commit")?;
        remote.push_from(&seed, branch)?;
        Ok(remote)
    }

    /// Path usable as a git remote location.
    pub fn url(&self) -> String {
        self.dir.path().display().to_string()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Push `repo`'s HEAD (and tags) to `branch` on this remote.
    pub fn push_from(&self, repo: &TestRepo, branch: &str) -> Result<()> {
        repo.run(&[
            "push",
            "--quiet",
            "--tags",
            &self.url(),
            &format!("HEAD:refs/heads/{branch}"),
        ])?;
        Ok(())
    }

    pub fn has_branch(&self, branch: &str) -> Result<bool> {
        let out = run_git(
            self.path(),
            &["branch", "--list", "--format=%(refname:short)", branch],
        )?;
        Ok(out.lines().any(|line| line.trim() == branch))
    }

    /// Commit messages on `branch`, newest first.
    pub fn messages(&self, branch: &str) -> Result<Vec<String>> {
        let out = run_git(self.path(), &["log", "--format=%B%x1e", branch])?;
        Ok(out
            .split('\x1e')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Files tracked on `branch`, sorted.
    pub fn files(&self, branch: &str) -> Result<Vec<String>> {
        let out = run_git(self.path(), &["ls-tree", "-r", "--name-only", branch])?;
        let mut files: Vec<String> = out.lines().map(|l| l.trim().to_string()).collect();
        files.sort();
        Ok(files)
    }

    pub fn read_file(&self, branch: &str, path: &str) -> Result<String> {
        run_git(self.path(), &["show", &format!("{branch}:{path}")])
    }

    pub fn tags(&self) -> Result<Vec<String>> {
        let out = run_git(self.path(), &["tag", "--list"])?;
        Ok(out.lines().map(|l| l.trim().to_string()).collect())
    }
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
