//! Git adapter for artefact builds.
//!
//! Every interaction with a repository goes through a `git` subprocess run in
//! the repository's work tree. Failures surface as
//! [`BuildError::CommandFailure`] carrying what the call was for.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::core::log_format::{TAG_REF_FORMAT, TagRef, parse_tag_refs};
use crate::error::BuildError;

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Committer identity passed as `-c user.name=… -c user.email=…`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    identity: Option<GitIdentity>,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: Option<GitIdentity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Fail early if the `git` executable cannot be run.
    pub fn ensure_available(&self) -> Result<()> {
        let out = self.run_capture("check that git is available", &["--version"])?;
        debug!(version = %out.trim(), "git available");
        Ok(())
    }

    /// Initialise an empty repository in the work tree.
    pub fn init(&self) -> Result<()> {
        self.run_checked("initialise repository", &["init"])?;
        Ok(())
    }

    #[instrument(skip_all, fields(name, url))]
    pub fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        debug!(name, url, "adding remote");
        self.run_checked("add remote", &["remote", "add", name, url])?;
        Ok(())
    }

    /// True if `branch` exists as a head at `remote` (name or location).
    pub fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool> {
        let wanted = format!("refs/heads/{branch}");
        let out = self.run_capture(
            "check remote branch",
            &["ls-remote", "--heads", remote, &wanted],
        )?;
        let exists = out
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .any(|name| name == wanted);
        debug!(remote, branch, exists, "remote branch lookup");
        Ok(exists)
    }

    /// Return the first of `candidates` that exists at `remote`.
    pub fn find_existing_branch(&self, remote: &str, candidates: &[&str]) -> Result<String> {
        for branch in candidates {
            if self.remote_branch_exists(remote, branch)? {
                return Ok((*branch).to_string());
            }
        }
        Err(BuildError::BranchNotFound {
            remote: remote.to_string(),
            branches: candidates.iter().map(|b| (*b).to_string()).collect(),
        }
        .into())
    }

    /// Pull `branch` (and all tags) from `remote`.
    #[instrument(skip_all, fields(remote, branch))]
    pub fn pull(&self, remote: &str, branch: &str) -> Result<()> {
        self.run_checked("pull remote branch", &["pull", "--tags", remote, branch])?;
        debug!(remote, branch, "pulled");
        Ok(())
    }

    /// Create and checkout a new branch at current HEAD.
    #[instrument(skip_all, fields(branch))]
    pub fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "creating and checking out new branch");
        self.run_checked("create branch", &["checkout", "-b", branch])?;
        Ok(())
    }

    /// Return the current branch name.
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(
            "read current branch",
            &["rev-parse", "--abbrev-ref", "HEAD"],
        )?;
        Ok(out.trim().to_string())
    }

    /// Get status entries (including untracked) in porcelain format.
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(
            "read working tree status",
            &["status", "--porcelain=v1", "-uall"],
        )?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_status_line(line)?);
        }
        Ok(entries)
    }

    /// True if any tracked or untracked file differs from HEAD.
    pub fn has_changes(&self) -> Result<bool> {
        let entries = self.status_porcelain()?;
        for entry in &entries {
            debug!(code = %entry.code, path = %entry.path, "changed");
        }
        if !entries.is_empty() {
            debug!(changed = entries.len(), "working tree has changes");
        }
        Ok(!entries.is_empty())
    }

    /// Stage all changes, including deletions.
    pub fn add_all(&self) -> Result<()> {
        self.run_checked("stage files", &["add", "--all"])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run_capture("read staged files", &["diff", "--cached", "--name-only"])?;
        Ok(!out.trim().is_empty())
    }

    /// Commit staged changes with a message.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!("committing staged changes");
        self.run_checked("commit files", &["commit", "-m", message])?;
        Ok(true)
    }

    /// Create a lightweight tag at HEAD.
    pub fn tag(&self, name: &str) -> Result<()> {
        self.run_checked("add tag", &["tag", name])?;
        Ok(())
    }

    /// Arguments for pushing HEAD to `branch` together with all tags.
    pub fn push_args(remote: &str, branch: &str) -> Vec<String> {
        vec![
            "push".to_string(),
            "--tags".to_string(),
            remote.to_string(),
            format!("HEAD:{branch}"),
        ]
    }

    #[instrument(skip_all, fields(remote, branch))]
    pub fn push(&self, remote: &str, branch: &str) -> Result<()> {
        let args = Self::push_args(remote, branch);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_checked("push to remote", &args)?;
        Ok(())
    }

    /// True if HEAD resolves to a commit.
    pub fn has_commits(&self) -> Result<bool> {
        let out = self.run(&["rev-parse", "--verify", "--quiet", "HEAD^{commit}"])?;
        Ok(out.status.success())
    }

    /// Number of commits in first-parent history of HEAD (0 for an empty repo).
    pub fn commit_count(&self) -> Result<usize> {
        if !self.has_commits()? {
            return Ok(0);
        }
        let out = self.run_capture(
            "count commits",
            &["rev-list", "--first-parent", "--count", "HEAD"],
        )?;
        out.trim().parse::<usize>().map_err(|_| {
            BuildError::MalformedOutput {
                purpose: "counting commits",
                detail: format!("not a number: {:?}", out.trim()),
            }
            .into()
        })
    }

    /// Full hash of the commit `rev` points to, if it exists.
    pub fn resolve_commit(&self, rev: &str) -> Result<Option<String>> {
        let spec = format!("{rev}^{{commit}}");
        let out = self.run(&["rev-parse", "--verify", "--quiet", &spec])?;
        if !out.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&out.stdout).trim().to_string()))
    }

    /// Raw tag references under `refs/tags`.
    pub fn tag_refs(&self) -> Result<Vec<TagRef>> {
        let out = self.run_capture(
            "list tags",
            &["for-each-ref", TAG_REF_FORMAT, "refs/tags"],
        )?;
        Ok(parse_tag_refs(&out)?)
    }

    /// Run `git log` with the given arguments and return stdout.
    pub fn log(&self, args: &[&str]) -> Result<String> {
        let mut full = vec!["log"];
        full.extend_from_slice(args);
        self.run_capture("read commit history", &full)
    }

    fn run_capture(&self, purpose: &str, args: &[&str]) -> Result<String> {
        let output = self.run_checked(purpose, args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, purpose: &str, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(purpose, args = %args.join(" "), %stderr, "git command failed");
            return Err(BuildError::CommandFailure {
                purpose: purpose.to_string(),
                command: args.join(" "),
                status: output.status.code(),
                stderr,
            }
            .into());
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new("git");
        cmd.arg("--no-pager");
        if let Some(identity) = &self.identity {
            cmd.arg("-c")
                .arg(format!("user.name={}", identity.name))
                .arg("-c")
                .arg(format!("user.email={}", identity.email));
        }
        cmd.args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(BuildError::MalformedOutput {
            purpose: "reading working tree status",
            detail: format!("unexpected porcelain line: '{line}'"),
        }
        .into());
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}
