//! Error taxonomy for artefact builds.
//!
//! Every variant is fatal to the current run. Functions return
//! `anyhow::Result`, so these values travel inside `anyhow::Error` (possibly
//! under added context) and are recovered with `downcast_ref::<BuildError>()`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("git repository '{}' does not contain any commits", .path.display())]
    EmptyRepository { path: PathBuf },

    #[error("unsupported commit range: from={from} to={to} (ordinal and hash bounds cannot be mixed)")]
    UnsupportedRange { from: String, to: String },

    #[error("source commit '{hash}' recorded in the artefact does not exist in '{}'", .source_dir.display())]
    ProvenanceNotResolvable { hash: String, source_dir: PathBuf },

    #[error("mapped source path does not exist: {}", .path.display())]
    MissingSourcePath { path: PathBuf },

    #[error("unable to copy '{}' to '{}'", .from.display(), .to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source tag(s) '{}' already exist in the artefact repository under a different commit", .tags.join(", "))]
    TagConflict { tags: Vec<String> },

    #[error("none of the branches '{}' exist at remote '{remote}'", .branches.join(", "))]
    BranchNotFound {
        remote: String,
        branches: Vec<String>,
    },

    #[error("incorrect value '{value}' specified for {what}")]
    RemoteValidation { what: &'static str, value: String },

    #[error("{purpose} failed (git {command}, exit {}): {stderr}", .status.map_or_else(|| "signal".to_string(), |code| code.to_string()))]
    CommandFailure {
        purpose: String,
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("unexpected git output while {purpose}: {detail}")]
    MalformedOutput { purpose: &'static str, detail: String },

    #[error("invalid map file {}:{line}: {reason}", .path.display())]
    InvalidMapFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BuildError {
    /// True for errors caused by bad user input rather than repository state.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            BuildError::RemoteValidation { .. }
                | BuildError::InvalidMapFile { .. }
                | BuildError::InvalidConfig(_)
        )
    }
}

/// Find the first `BuildError` anywhere in an error chain.
pub fn find_build_error(err: &anyhow::Error) -> Option<&BuildError> {
    err.chain().find_map(|cause| cause.downcast_ref::<BuildError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn tag_conflict_names_every_tag() {
        let err = BuildError::TagConflict {
            tags: vec!["v1.0".to_string(), "v1.1".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "source tag(s) 'v1.0, v1.1' already exist in the artefact repository under a different commit"
        );
    }

    #[test]
    fn command_failure_reports_purpose_and_exit() {
        let err = BuildError::CommandFailure {
            purpose: "pull remote branch".to_string(),
            command: "pull --tags origin main".to_string(),
            status: Some(128),
            stderr: "fatal: couldn't find remote ref main".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("pull remote branch failed"));
        assert!(msg.contains("exit 128"));
    }

    #[test]
    fn find_build_error_sees_through_context() {
        let err = anyhow::Error::from(BuildError::EmptyRepository {
            path: PathBuf::from("/tmp/src"),
        });
        let wrapped = Err::<(), _>(err).context("list commits").unwrap_err();
        assert!(matches!(
            find_build_error(&wrapped),
            Some(BuildError::EmptyRepository { .. })
        ));
    }
}
