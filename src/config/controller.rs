//! # Controller Configuration
//!
//! Updater-level settings loaded from environment variables.

use crate::constants::{DEFAULT_LOG_LEVEL, DEFAULT_RETRY_INTERVAL_SECS};
use crate::updater::{TaskSettings, WebhookAbsencePolicy};
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Updater-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Fixed retry interval after a failed patch (seconds)
    pub retry_interval_secs: u64,
    /// Consecutive failures tolerated before a task gives up (unset = never)
    pub max_retries: Option<u32>,
    /// Check the webhook configuration when a task starts
    pub check_webhook_on_start: bool,
    /// Policy when the start-up check finds no webhook configuration
    pub webhook_missing_on_start: WebhookAbsencePolicy,
    /// Policy when a patch reports the webhook configuration as not found
    pub webhook_missing_on_apply: WebhookAbsencePolicy,
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
            max_retries: None,
            check_webhook_on_start: true,
            webhook_missing_on_start: WebhookAbsencePolicy::Tolerate,
            webhook_missing_on_apply: WebhookAbsencePolicy::Terminate,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            retry_interval_secs: parse_or(
                lookup("RETRY_INTERVAL_SECS"),
                defaults.retry_interval_secs,
            ),
            max_retries: lookup("MAX_RETRIES")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|max| *max > 0),
            check_webhook_on_start: lookup("CHECK_WEBHOOK_ON_START")
                .map_or(defaults.check_webhook_on_start, |v| parse_bool(&v)),
            webhook_missing_on_start: parse_or(
                lookup("WEBHOOK_MISSING_ON_START"),
                defaults.webhook_missing_on_start,
            ),
            webhook_missing_on_apply: parse_or(
                lookup("WEBHOOK_MISSING_ON_APPLY"),
                defaults.webhook_missing_on_apply,
            ),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").map(|v| v.to_lowercase()).as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        }
    }

    /// Get retry interval duration
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    /// Settings handed to every reconciler task
    pub fn task_settings(&self) -> TaskSettings {
        TaskSettings {
            retry_interval: self.retry_interval(),
            max_retries: self.max_retries,
            check_webhook_on_start: self.check_webhook_on_start,
            missing_on_start: self.webhook_missing_on_start,
            missing_on_apply: self.webhook_missing_on_apply,
        }
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_bool(value: &str) -> bool {
    let v_lower = value.to_lowercase();
    v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
}
