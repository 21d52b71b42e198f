//! Deterministic, pure logic shared by the artefact builder.
//!
//! Core modules must be free of I/O side effects. They operate on git output
//! already captured as text and on in-memory values.

pub mod log_format;
pub mod map_file;
pub mod message;
pub mod range;
pub mod refs;
pub mod tags;
pub mod types;
