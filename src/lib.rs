//! Webhook CA Updater Library
//!
//! Keeps the `caBundle` of a Kubernetes `ValidatingWebhookConfiguration` in
//! sync with a CA certificate file that a certificate manager rotates on disk.
//! Tests are included in the module files and under `tests/`.

pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod observability;
pub mod server;
pub mod updater;
pub mod validation;
