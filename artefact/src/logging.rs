//! Tracing setup for the `artefact` binary.
//!
//! Stage progress and diagnostics go to stderr through `tracing`. Build
//! results meant for the user (the information banner, the commit message,
//! the simulated push command) are printed to stdout by the binary.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `info` so build stages are visible.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=artefact=debug artefact git@example.com:org/app.git develop
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
