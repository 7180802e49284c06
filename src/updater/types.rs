//! # Types
//!
//! Core types for the CA bundle reconciler.

use crate::constants::DEFAULT_RETRY_INTERVAL_SECS;
use crate::error::ConfigValidationError;
use crate::validation::validate_webhook_name;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Reconciliation target installed through the command listener
///
/// Field names on the wire match the command payload:
/// `{"webhook": "...", "ca_dir": "...", "ca_file": "..."}`.
/// Missing fields decode as empty values so that [`ReconcilerConfig::validate`]
/// reports what is wrong instead of the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReconcilerConfig {
    /// Name of the `ValidatingWebhookConfiguration` to keep current
    #[serde(rename = "webhook", default)]
    pub webhook_name: String,
    /// Directory the certificate manager writes into
    #[serde(rename = "ca_dir", default)]
    pub cert_directory: PathBuf,
    /// CA bundle file name inside `cert_directory`
    #[serde(rename = "ca_file", default)]
    pub cert_file_name: String,
}

impl ReconcilerConfig {
    pub fn new(
        webhook_name: impl Into<String>,
        cert_directory: impl Into<PathBuf>,
        cert_file_name: impl Into<String>,
    ) -> Self {
        Self {
            webhook_name: webhook_name.into(),
            cert_directory: cert_directory.into(),
            cert_file_name: cert_file_name.into(),
        }
    }

    /// Structural validation; touches the filesystem only to stat `cert_directory`
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        validate_webhook_name(&self.webhook_name)?;

        let metadata = std::fs::metadata(&self.cert_directory).map_err(|source| {
            ConfigValidationError::CertDirectoryUnavailable {
                path: self.cert_directory.clone(),
                source,
            }
        })?;
        if !metadata.is_dir() {
            return Err(ConfigValidationError::NotADirectory {
                path: self.cert_directory.clone(),
            });
        }

        if self.cert_file_name.is_empty() {
            return Err(ConfigValidationError::EmptyCertFileName);
        }
        if Path::new(&self.cert_file_name).file_name()
            != Some(std::ffi::OsStr::new(&self.cert_file_name))
        {
            return Err(ConfigValidationError::InvalidCertFileName {
                name: self.cert_file_name.clone(),
            });
        }

        Ok(())
    }

    /// Full path of the CA bundle file
    #[must_use]
    pub fn cert_path(&self) -> PathBuf {
        self.cert_directory.join(&self.cert_file_name)
    }
}

/// What to do when the webhook configuration does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAbsencePolicy {
    /// Log and keep going
    Tolerate,
    /// End the reconciler task
    Terminate,
}

impl WebhookAbsencePolicy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookAbsencePolicy::Tolerate => "tolerate",
            WebhookAbsencePolicy::Terminate => "terminate",
        }
    }
}

impl FromStr for WebhookAbsencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tolerate" => Ok(WebhookAbsencePolicy::Tolerate),
            "terminate" => Ok(WebhookAbsencePolicy::Terminate),
            other => Err(format!(
                "unknown webhook absence policy '{other}', expected 'tolerate' or 'terminate'"
            )),
        }
    }
}

/// Behavioural knobs shared by every task a supervisor starts
#[derive(Debug, Clone)]
pub struct TaskSettings {
    /// Fixed delay before a failed pass is retried
    pub retry_interval: Duration,
    /// Consecutive failed passes tolerated before giving up; `None` retries forever
    pub max_retries: Option<u32>,
    /// Check the webhook configuration before watching
    pub check_webhook_on_start: bool,
    /// Policy when the start-up check finds no webhook configuration
    pub missing_on_start: WebhookAbsencePolicy,
    /// Policy when a patch reports the webhook configuration as not found
    pub missing_on_apply: WebhookAbsencePolicy,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
            max_retries: None,
            check_webhook_on_start: true,
            missing_on_start: WebhookAbsencePolicy::Tolerate,
            missing_on_apply: WebhookAbsencePolicy::Terminate,
        }
    }
}

/// Why a task ended in [`TaskState::Failed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The webhook configuration no longer exists
    NotFound,
    /// The certificate directory could not be watched
    WatchSetup,
    /// `max_retries` consecutive passes failed
    RetriesExhausted,
}

/// Lifecycle of a reconciler task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Starting,
    Watching,
    /// A failed pass is waiting for its retry deadline
    Retrying,
    Stopped,
    Failed(FailureReason),
}

impl TaskState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Stopped | TaskState::Failed(_))
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Starting => "starting",
            TaskState::Watching => "watching",
            TaskState::Retrying => "retrying",
            TaskState::Stopped => "stopped",
            TaskState::Failed(FailureReason::NotFound) => "failed-not-found",
            TaskState::Failed(FailureReason::WatchSetup) => "failed-watch-setup",
            TaskState::Failed(FailureReason::RetriesExhausted) => "failed-retries-exhausted",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// File content matches the last applied bundle
    Unchanged,
    /// Bundle validated and patched
    Applied,
    /// Bundle failed validation; wait for the next write
    Invalid,
    /// Read or patch failed in a way worth retrying
    Transient,
    /// The webhook configuration is gone
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciler_config_decodes_command_payload() {
        let config: ReconcilerConfig = serde_json::from_str(
            r#"{"webhook": "my-webhook", "ca_dir": "/etc/certs", "ca_file": "ca.crt"}"#,
        )
        .unwrap();
        assert_eq!(config.webhook_name, "my-webhook");
        assert_eq!(config.cert_directory, PathBuf::from("/etc/certs"));
        assert_eq!(config.cert_file_name, "ca.crt");
        assert_eq!(config.cert_path(), PathBuf::from("/etc/certs/ca.crt"));
    }

    #[test]
    fn test_reconciler_config_missing_fields_decode_empty() {
        let config: ReconcilerConfig = serde_json::from_str(r#"{"webhook": "w"}"#).unwrap();
        assert!(config.cert_file_name.is_empty());
        assert!(config.cert_directory.as_os_str().is_empty());
    }

    #[test]
    fn test_validate_accepts_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReconcilerConfig::new("my-webhook", dir.path(), "ca.crt");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReconcilerConfig::new("my-webhook", dir.path().join("nope"), "ca.crt");
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::CertDirectoryUnavailable { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_file_as_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ca.crt");
        std::fs::write(&file, b"x").unwrap();
        let config = ReconcilerConfig::new("my-webhook", &file, "ca.crt");
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_file_names() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["", "sub/ca.crt", "..", "."] {
            let config = ReconcilerConfig::new("my-webhook", dir.path(), name);
            assert!(config.validate().is_err(), "'{name}' should be rejected");
        }
    }

    #[test]
    fn test_webhook_absence_policy_from_str() {
        assert_eq!(
            "Tolerate".parse::<WebhookAbsencePolicy>().unwrap(),
            WebhookAbsencePolicy::Tolerate
        );
        assert_eq!(
            " terminate ".parse::<WebhookAbsencePolicy>().unwrap(),
            WebhookAbsencePolicy::Terminate
        );
        assert!("ignore".parse::<WebhookAbsencePolicy>().is_err());
    }

    #[test]
    fn test_task_state_terminal() {
        assert!(TaskState::Stopped.is_terminal());
        assert!(TaskState::Failed(FailureReason::NotFound).is_terminal());
        assert!(!TaskState::Retrying.is_terminal());
        assert_eq!(
            TaskState::Failed(FailureReason::NotFound).to_string(),
            "failed-not-found"
        );
    }
}
