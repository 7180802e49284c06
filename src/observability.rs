//! # Observability
//!
//! Tracing subscriber setup. `RUST_LOG` takes precedence over `LOG_LEVEL`.

use crate::config::{ControllerConfig, LogFormat};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// Returns an error if a subscriber is already installed.
pub fn init_tracing(config: &ControllerConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new(crate::constants::DEFAULT_LOG_LEVEL));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.log_format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Text => builder.try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
