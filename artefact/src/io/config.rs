//! Build configuration stored in `<root>/.artefact.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::refs::validate_branch_name;
use crate::error::BuildError;
use crate::io::git::GitIdentity;

/// File name looked up in the root directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = ".artefact.toml";

/// Build configuration (TOML).
///
/// Every field is optional in the file. Command line flags take precedence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Branch pulled when the requested branch does not exist on the remote.
    pub default_branch: String,

    /// Tags are only applied while the artefact is on this branch.
    pub tag_branch_filter: Option<String>,

    /// Map file, relative to the root directory.
    pub map_file: Option<PathBuf>,

    /// Artefact working directory, relative to the root directory.
    pub artefact_dir: PathBuf,

    /// Name the artefact remote is registered under.
    pub remote_name: String,

    /// Carry new source tags over to the artefact.
    pub propagate_tags: bool,

    pub identity: Option<IdentityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    pub name: String,
    pub email: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            default_branch: "master".to_string(),
            tag_branch_filter: None,
            map_file: None,
            artefact_dir: PathBuf::from("artefact"),
            remote_name: "origin".to_string(),
            propagate_tags: false,
            identity: None,
        }
    }
}

impl From<IdentityConfig> for GitIdentity {
    fn from(identity: IdentityConfig) -> Self {
        Self {
            name: identity.name,
            email: identity.email,
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        validate_branch_name(&self.default_branch, "default branch")
            .map_err(|err| invalid(format!("default_branch: {err}")))?;
        if let Some(filter) = &self.tag_branch_filter {
            validate_branch_name(filter, "tag branch filter")
                .map_err(|err| invalid(format!("tag_branch_filter: {err}")))?;
        }
        validate_branch_name(&self.remote_name, "remote name")
            .map_err(|err| invalid(format!("remote_name: {err}")))?;
        if self.artefact_dir.as_os_str().is_empty() {
            return Err(invalid("artefact_dir must not be empty".to_string()));
        }
        if let Some(identity) = &self.identity {
            if identity.name.trim().is_empty() || identity.email.trim().is_empty() {
                return Err(invalid(
                    "identity.name and identity.email must be non-empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn invalid(message: String) -> anyhow::Error {
    BuildError::InvalidConfig(message).into()
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `BuildConfig::default()`.
pub fn load_config(path: &Path) -> Result<BuildConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        let cfg = BuildConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BuildConfig = toml::from_str(&contents)
        .map_err(|err| invalid(format!("parse {}: {err}", path.display())))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    debug!(path = %path.display(), "loaded config");
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::find_build_error;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, BuildConfig::default());
        assert_eq!(cfg.default_branch, "master");
        assert!(!cfg.propagate_tags);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            "default_branch = \"main\"\npropagate_tags = true\n\n[identity]\nname = \"Deploy Bot\"\nemail = \"deploy@example.com\"\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.default_branch, "main");
        assert!(cfg.propagate_tags);
        assert_eq!(cfg.remote_name, "origin");
        assert_eq!(cfg.artefact_dir, PathBuf::from("artefact"));
        let identity: GitIdentity = cfg.identity.expect("identity").into();
        assert_eq!(identity.email, "deploy@example.com");
    }

    #[test]
    fn invalid_branch_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "default_branch = \"bad..name\"\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(
            find_build_error(&err),
            Some(BuildError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "defualt_branch = \"main\"\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(
            find_build_error(&err),
            Some(BuildError::InvalidConfig(_))
        ));
    }
}
