//! Tracing setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "screencast_recorder=debug";

/// Install the global tracing subscriber.
///
/// The filter is read from `RUST_LOG`, falling back to `default_filter`.
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_tracing(default_filter: &str) {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    match result {
        Ok(()) => tracing::info!("Starting screencast-recorder v{}", env!("CARGO_PKG_VERSION")),
        Err(e) => tracing::debug!("Tracing subscriber already installed: {}", e),
    }
}
