//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the logging system with tracing.
///
/// Filtering comes from `RUST_LOG` when set, otherwise defaults to
/// `info` globally with `debug` for the aurora crates.
///
/// # Example
/// ```
/// aurora_core::init_logging();
/// tracing::info!("Renderer starting");
/// ```
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,aurora=debug,aurora_rhi=debug,aurora_renderer=debug,aurora_resources=debug")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
