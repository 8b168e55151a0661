//! Log output for binaries embedding blocksync

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install a global subscriber filtered by `RUST_LOG` (default `info`).
///
/// Lines carry thread ids and names, so work running on the affinity
/// thread is recognizable.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_with_default("info")
}

/// Like [`init`], using `directives` when `RUST_LOG` is unset.
pub fn init_with_default(directives: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_level(true)
        .compact();

    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directives))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
