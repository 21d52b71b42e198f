//! Build deployment artefacts from a git source repository.
//!
//! A build copies (optionally mapped) source files into a separate artefact
//! repository, commits them with a message recording the source commit they
//! came from, and pushes the result. The architecture keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (output parsing, range resolution,
//!   message synthesis, map files, tag diffing). No I/O.
//! - **[`io`]**: Side effects (git subprocesses, filesystem, configuration).
//!
//! [`context`] resolves command line input into a [`context::RunContext`] and
//! [`build`] runs the pipeline against it.

pub mod build;
pub mod context;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
