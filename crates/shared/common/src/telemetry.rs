//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize the global tracing subscriber.
///
/// Returns `false` if a subscriber was already installed (e.g. by another test).
pub fn init_tracing(config: &LoggingConfig) -> bool {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::new(&config.level))
        .try_init()
        .is_ok()
}
