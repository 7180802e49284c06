//! # Constants
//!
//! Shared constants used throughout the updater.
//!
//! These values represent reasonable defaults and can be overridden via
//! command-line flags or environment variables where applicable.

/// Default port for the command listener (also serves probes and metrics)
pub const DEFAULT_PORT: u16 = 80;

/// Default fixed interval before a failed webhook patch is retried (seconds)
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 60;

/// PEM block label accepted in a CA bundle
pub const CERTIFICATE_PEM_TAG: &str = "CERTIFICATE";

/// Maximum length of a DNS-1123 subdomain resource name
pub const MAX_RESOURCE_NAME_LENGTH: usize = 253;

/// Capacity of the side channel carrying errors from an established watch
pub const WATCH_ERROR_CHANNEL_CAPACITY: usize = 16;

/// Default log filter when neither `RUST_LOG` nor `LOG_LEVEL` is set
pub const DEFAULT_LOG_LEVEL: &str = "info";
