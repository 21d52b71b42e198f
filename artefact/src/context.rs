//! Run context: validated, absolute inputs for a single build.

use std::env;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::core::refs::{is_git_uri, validate_branch_name};
use crate::error::BuildError;
use crate::io::config::{BuildConfig, DEFAULT_CONFIG_FILE, load_config};
use crate::io::git::GitIdentity;

/// Raw build inputs as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub remote: String,
    pub branch: String,
    pub root: Option<PathBuf>,
    pub src: Option<PathBuf>,
    pub map: Option<PathBuf>,
    pub artefact: Option<PathBuf>,
    pub default_branch: Option<String>,
    pub tag_branch_filter: Option<String>,
    pub deploy: bool,
    pub cleanup: bool,
    pub propagate_tags: bool,
    pub config: Option<PathBuf>,
}

/// Everything a build needs, resolved once and not changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub root: PathBuf,
    pub source: PathBuf,
    pub artefact: PathBuf,
    pub map_file: Option<PathBuf>,
    /// Remote location: an absolute local path or a git URI.
    pub remote: String,
    /// Name the remote is registered under in the artefact repository.
    pub remote_name: String,
    pub branch: String,
    pub default_branch: String,
    pub tag_branch_filter: Option<String>,
    pub deploy: bool,
    pub cleanup: bool,
    pub propagate_tags: bool,
    pub identity: Option<GitIdentity>,
}

impl RunContext {
    /// Resolve options, reading the config file from the root directory.
    pub fn resolve(options: BuildOptions) -> Result<Self> {
        let cwd = env::current_dir().context("read current directory")?;
        let root = match &options.root {
            Some(root) => absolute(&cwd, root),
            None => cwd,
        };
        let root = existing_dir(&root, "root directory")?;
        let config_path = match &options.config {
            Some(path) => absolute(&root, path),
            None => root.join(DEFAULT_CONFIG_FILE),
        };
        let config = load_config(&config_path)?;
        Self::from_config(root, options, &config)
    }

    /// Resolve options against an already loaded config. `root` must be absolute.
    pub fn from_config(root: PathBuf, options: BuildOptions, config: &BuildConfig) -> Result<Self> {
        let source = match &options.src {
            Some(src) => existing_dir(&absolute(&root, src), "source directory")?,
            None => root.clone(),
        };

        let map_file = match options.map.as_ref().or(config.map_file.as_ref()) {
            Some(map) => {
                let map = absolute(&root, map);
                if !map.is_file() {
                    bail!("map file {} does not exist", map.display());
                }
                Some(map)
            }
            None => None,
        };

        let artefact = absolute(
            &root,
            options.artefact.as_deref().unwrap_or(&config.artefact_dir),
        );
        if source.starts_with(&artefact) {
            bail!(
                "artefact directory {} must not contain the source directory {}",
                artefact.display(),
                source.display()
            );
        }

        let remote = resolve_remote(&root, &options.remote)?;

        validate_branch_name(&options.branch, "branch")?;
        let default_branch = options
            .default_branch
            .unwrap_or_else(|| config.default_branch.clone());
        validate_branch_name(&default_branch, "default branch")?;
        let tag_branch_filter = options
            .tag_branch_filter
            .or_else(|| config.tag_branch_filter.clone());
        if let Some(filter) = &tag_branch_filter {
            validate_branch_name(filter, "tag branch filter")?;
        }

        let ctx = Self {
            root,
            source,
            artefact,
            map_file,
            remote,
            remote_name: config.remote_name.clone(),
            branch: options.branch,
            default_branch,
            tag_branch_filter,
            deploy: options.deploy,
            cleanup: options.cleanup,
            propagate_tags: options.propagate_tags || config.propagate_tags,
            identity: config.identity.clone().map(GitIdentity::from),
        };
        debug!(?ctx, "resolved run context");
        Ok(ctx)
    }

    /// Human-readable summary printed before a build.
    pub fn banner(&self) -> String {
        let rule = "-".repeat(70);
        let yes_no = |flag: bool| if flag { "Yes" } else { "No" };
        let map = self
            .map_file
            .as_ref()
            .map_or_else(|| "No".to_string(), |m| m.display().to_string());

        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, " Artefact information");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, " Root directory:        {}", self.root.display());
        let _ = writeln!(out, " Source directory:      {}", self.source.display());
        let _ = writeln!(out, " Artefact directory:    {}", self.artefact.display());
        let _ = writeln!(out, " Remote repository:     {}", self.remote);
        let _ = writeln!(out, " Remote branch:         {}", self.branch);
        let _ = writeln!(out, " Remote default branch: {}", self.default_branch);
        let _ = writeln!(out, " Map file:              {map}");
        let _ = writeln!(out, " Will deploy:           {}", yes_no(self.deploy));
        let _ = writeln!(out, " Will cleanup:          {}", yes_no(self.cleanup));
        let _ = writeln!(out, " Will propagate tags:   {}", yes_no(self.propagate_tags));
        let _ = write!(out, "{rule}");
        out
    }
}

/// An existing local directory (made absolute) or a git URI, as given.
fn resolve_remote(root: &Path, remote: &str) -> Result<String> {
    let local = absolute(root, Path::new(remote));
    if !remote.is_empty() && local.exists() {
        return Ok(local.display().to_string());
    }
    if is_git_uri(remote) {
        return Ok(remote.to_string());
    }
    Err(BuildError::RemoteValidation {
        what: "remote",
        value: remote.to_string(),
    }
    .into())
}

fn existing_dir(path: &Path, what: &str) -> Result<PathBuf> {
    if !path.is_dir() {
        bail!("{what} {} does not exist", path.display());
    }
    path.canonicalize()
        .with_context(|| format!("resolve {what} {}", path.display()))
}

/// Join `path` onto `base` unless already absolute, folding `.` and `..`.
fn absolute(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
