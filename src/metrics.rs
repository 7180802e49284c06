//! # Metrics
//!
//! Prometheus metrics for monitoring the updater.
//!
//! ## Metrics Exposed
//!
//! - `webhook_ca_updater_patches_total` - CA bundles successfully applied to the webhook
//! - `webhook_ca_updater_patch_errors_total` - Failed patch attempts, by reason
//! - `webhook_ca_updater_invalid_bundles_total` - Bundles rejected by validation
//! - `webhook_ca_updater_retries_scheduled_total` - Retries scheduled after a failed pass
//! - `webhook_ca_updater_watch_errors_total` - Errors reported by an established directory watch
//! - `webhook_ca_updater_replacements_total` - Reconciliation targets installed via the command listener
//! - `webhook_ca_updater_active_tasks` - Reconciler tasks currently running

use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static PATCHES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "webhook_ca_updater_patches_total",
        "Total number of CA bundles applied to the webhook configuration",
    )
    .expect("Failed to create PATCHES_TOTAL metric - this should never happen")
});

static PATCH_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "webhook_ca_updater_patch_errors_total",
            "Total number of failed webhook patch attempts",
        ),
        &["reason"],
    )
    .expect("Failed to create PATCH_ERRORS_TOTAL metric - this should never happen")
});

static INVALID_BUNDLES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "webhook_ca_updater_invalid_bundles_total",
        "Total number of CA bundles rejected by validation",
    )
    .expect("Failed to create INVALID_BUNDLES_TOTAL metric - this should never happen")
});

static RETRIES_SCHEDULED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "webhook_ca_updater_retries_scheduled_total",
        "Total number of retries scheduled after a failed reconciliation pass",
    )
    .expect("Failed to create RETRIES_SCHEDULED_TOTAL metric - this should never happen")
});

static WATCH_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "webhook_ca_updater_watch_errors_total",
        "Total number of errors reported by the certificate directory watch",
    )
    .expect("Failed to create WATCH_ERRORS_TOTAL metric - this should never happen")
});

static REPLACEMENTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "webhook_ca_updater_replacements_total",
        "Total number of reconciliation targets installed",
    )
    .expect("Failed to create REPLACEMENTS_TOTAL metric - this should never happen")
});

static ACTIVE_TASKS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "webhook_ca_updater_active_tasks",
        "Number of reconciler tasks currently running",
    )
    .expect("Failed to create ACTIVE_TASKS metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(PATCHES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PATCH_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INVALID_BUNDLES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RETRIES_SCHEDULED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REPLACEMENTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ACTIVE_TASKS.clone()))?;

    Ok(())
}

pub fn increment_patches() {
    PATCHES_TOTAL.inc();
}

pub fn increment_patch_errors(reason: &str) {
    PATCH_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_invalid_bundles() {
    INVALID_BUNDLES_TOTAL.inc();
}

pub fn increment_retries_scheduled() {
    RETRIES_SCHEDULED_TOTAL.inc();
}

pub fn increment_watch_errors() {
    WATCH_ERRORS_TOTAL.inc();
}

pub fn increment_replacements() {
    REPLACEMENTS_TOTAL.inc();
}

pub fn task_started() {
    ACTIVE_TASKS.inc();
}

pub fn task_finished() {
    ACTIVE_TASKS.dec();
}

/// Encode every registered metric in the Prometheus text format
pub fn gather_text() -> Result<Vec<u8>> {
    use prometheus::{Encoder, TextEncoder};

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}
