//! I/O for artefact builds: git subprocesses, the filesystem and configuration.

pub mod config;
pub mod git;
pub mod history;
pub mod mapping;
pub mod sync_state;
pub mod tags;
pub mod workdir;
