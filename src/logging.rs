//! Logging setup.
//!
//! The library only emits `tracing` events and never installs a subscriber
//! on its own. Embedding applications and tests opt in here; the filter
//! falls back to the `OCDSMELD_LOG` environment variable, then to `info`.

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber for this process.
///
/// `filter` takes standard env-filter directives, e.g.
/// `"info,ocdsmeld::merge=debug"`. Fails if a global subscriber is already
/// set.
pub fn init_logging(filter: Option<&str>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match filter {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_env("OCDSMELD_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
}
