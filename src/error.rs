//! # Errors
//!
//! Error taxonomy for the updater.
//!
//! - [`ConfigValidationError`] - rejected before any reconciler task starts
//! - [`CaBundleError`] - file content errors, recovered by waiting for the next write
//! - [`GatewayError`] - webhook patch failures, either fatal (`NotFound`) or retried
//! - [`WatchSetupError`] - the directory watch could not be established

use std::path::PathBuf;
use thiserror::Error;

/// A reconciliation target that must not be started
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("webhook parameter cannot be empty")]
    EmptyWebhookName,

    #[error("webhook '{name}' must be a valid Kubernetes resource name: {reason}")]
    InvalidWebhookName { name: String, reason: String },

    #[error("cannot access certificate directory '{}': {source}", path.display())]
    CertDirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{}' has to be a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("ca_file parameter has to be specified")]
    EmptyCertFileName,

    #[error("ca_file '{name}' must be a file name, not a path")]
    InvalidCertFileName { name: String },
}

/// Why a CA bundle was rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaBundleError {
    #[error("file is not in valid PEM format: {0}")]
    MalformedEncoding(String),

    #[error("CA bundle contains block type: {0}")]
    UnexpectedBlockType(String),

    #[error("certificate #{index} in CA bundle is not a valid X.509 certificate: {reason}")]
    CertificateParse { index: usize, reason: String },
}

/// Failure reported by a [`crate::gateway::WebhookGateway`]
///
/// Only [`GatewayError::NotFound`] is permanent; every other variant is
/// treated as transient by the reconciler task.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("webhook configuration '{name}' not found")]
    NotFound { name: String },

    #[error("webhook configuration '{name}' has no webhooks to patch")]
    NoWebhooks { name: String },

    #[error("Kubernetes API request for webhook configuration '{name}' failed: {source}")]
    Kube {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to build caBundle patch: {0}")]
    Patch(#[from] serde_json::Error),
}

impl GatewayError {
    /// True when the webhook configuration is confirmed absent
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }

    /// Short label for metrics
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::NotFound { .. } => "not_found",
            GatewayError::NoWebhooks { .. } => "no_webhooks",
            GatewayError::Kube { .. } => "api",
            GatewayError::Patch(_) => "patch",
        }
    }
}

/// The directory watch could not be established
#[derive(Debug, Error)]
#[error("failed to establish a watch on '{}': {source}", path.display())]
pub struct WatchSetupError {
    pub path: PathBuf,
    #[source]
    pub source: notify::Error,
}
