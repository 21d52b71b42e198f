//! Stable exit codes for the `artefact` binary.

/// Build finished, including no-op builds.
pub const OK: i32 = 0;
/// Build failed.
pub const FAILED: i32 = 1;
/// Remote, branch, map file or configuration input was rejected.
pub const INVALID_INPUT: i32 = 2;
