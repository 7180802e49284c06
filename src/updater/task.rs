//! # Reconciler Task
//!
//! One running reconciliation: watches the certificate directory, validates
//! each new bundle and pushes it to the webhook configuration.
//!
//! ## States
//!
//! `Starting -> Watching <-> Retrying -> Stopped`, with
//! `Watching/Retrying -> Failed(..)` as the terminal failure path.
//!
//! All work happens inside a single loop, so reads and patches for one task
//! never overlap. The loop waits on three things: cancellation, the retry
//! deadline and the watcher. Cancellation is polled first, so nothing is
//! applied once the token has fired; a patch already in flight is allowed to
//! finish.

use crate::gateway::WebhookGateway;
use crate::metrics;
use crate::updater::bundle::validate_ca_bundle;
use crate::updater::types::{
    FailureReason, PassOutcome, ReconcilerConfig, TaskSettings, TaskState, WebhookAbsencePolicy,
};
use crate::updater::watcher::{DirectoryWatcher, WatchSignal};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Single-owner reconciliation state machine
pub struct ReconcilerTask {
    config: ReconcilerConfig,
    gateway: Arc<dyn WebhookGateway>,
    settings: TaskSettings,
    last_applied_bundle: Option<Vec<u8>>,
    cancel: CancellationToken,
    state: watch::Sender<TaskState>,
}

impl std::fmt::Debug for ReconcilerTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcilerTask")
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl ReconcilerTask {
    /// Build a task for an already validated `config`
    pub fn new(
        config: ReconcilerConfig,
        gateway: Arc<dyn WebhookGateway>,
        settings: TaskSettings,
    ) -> Self {
        let (state, _) = watch::channel(TaskState::Starting);
        Self {
            config,
            gateway,
            settings,
            last_applied_bundle: None,
            cancel: CancellationToken::new(),
            state,
        }
    }

    /// Run the task on the tokio runtime and hand back its control handle
    #[must_use]
    pub fn spawn(self) -> ReconcilerHandle {
        let cancel = self.cancel.clone();
        let state = self.state.subscribe();
        let webhook_name = self.config.webhook_name.clone();
        let join = tokio::spawn(self.run());
        ReconcilerHandle {
            webhook_name,
            cancel,
            state,
            join: Some(join),
        }
    }

    /// Drive the task until cancellation or a terminal failure
    pub async fn run(mut self) -> TaskState {
        metrics::task_started();
        let webhook = self.config.webhook_name.clone();
        info!(
            webhook = webhook.as_str(),
            path = %self.config.cert_path().display(),
            "Starting CA bundle reconciler"
        );

        let final_state = self.run_inner().await;

        self.set_state(final_state);
        metrics::task_finished();
        match final_state {
            TaskState::Failed(reason) => {
                error!(webhook = webhook.as_str(), reason = ?reason, "CA bundle reconciler failed");
            }
            _ => info!(webhook = webhook.as_str(), "CA bundle reconciler stopped"),
        }
        final_state
    }

    async fn run_inner(&mut self) -> TaskState {
        if self.settings.check_webhook_on_start
            && !self.gateway.exists(&self.config.webhook_name).await
        {
            match self.settings.missing_on_start {
                WebhookAbsencePolicy::Tolerate => warn!(
                    webhook = self.config.webhook_name.as_str(),
                    on_apply = self.settings.missing_on_apply.as_str(),
                    "Webhook configuration does not exist yet; watching anyway"
                ),
                WebhookAbsencePolicy::Terminate => {
                    warn!(
                        webhook = self.config.webhook_name.as_str(),
                        "Webhook configuration does not exist; not starting"
                    );
                    return TaskState::Failed(FailureReason::NotFound);
                }
            }
        }

        if self.cancel.is_cancelled() {
            return TaskState::Stopped;
        }

        let mut watcher = match DirectoryWatcher::watch(&self.config.cert_directory) {
            Ok(watcher) => watcher,
            Err(e) => {
                error!(webhook = self.config.webhook_name.as_str(), error = %e, "Error watching for certificates");
                return TaskState::Failed(FailureReason::WatchSetup);
            }
        };
        self.set_state(TaskState::Watching);

        let final_state = self.watch_loop(&mut watcher).await;
        watcher.stop();
        final_state
    }

    async fn watch_loop(&mut self, watcher: &mut DirectoryWatcher) -> TaskState {
        let mut retry_at: Option<Instant> = None;
        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => return TaskState::Stopped,

                () = retry_timer(retry_at) => {
                    debug!(webhook = self.config.webhook_name.as_str(), "Retry deadline reached");
                    retry_at = None;
                    watcher.trigger();
                    self.set_state(TaskState::Watching);
                }

                signal = watcher.next() => match signal {
                    Some(WatchSignal::Changed) => {
                        match self.reconcile_once().await {
                            PassOutcome::Applied | PassOutcome::Unchanged => {
                                consecutive_failures = 0;
                                if retry_at.take().is_some() {
                                    self.set_state(TaskState::Watching);
                                }
                            }
                            PassOutcome::Invalid => {}
                            PassOutcome::NotFound => {
                                return TaskState::Failed(FailureReason::NotFound);
                            }
                            PassOutcome::Transient => {
                                consecutive_failures = consecutive_failures.saturating_add(1);
                                if self
                                    .settings
                                    .max_retries
                                    .is_some_and(|max| consecutive_failures > max)
                                {
                                    warn!(
                                        webhook = self.config.webhook_name.as_str(),
                                        attempts = consecutive_failures,
                                        "Giving up after repeated failures"
                                    );
                                    return TaskState::Failed(FailureReason::RetriesExhausted);
                                }
                                if retry_at.is_none() {
                                    retry_at = Some(Instant::now() + self.settings.retry_interval);
                                    metrics::increment_retries_scheduled();
                                    info!(
                                        webhook = self.config.webhook_name.as_str(),
                                        retry_in_secs = self.settings.retry_interval.as_secs(),
                                        "Scheduled retry"
                                    );
                                    self.set_state(TaskState::Retrying);
                                }
                            }
                        }
                    }
                    Some(WatchSignal::Error(e)) => {
                        error!(
                            path = %watcher.directory().display(),
                            error = %e,
                            "An error occurred while watching certificates"
                        );
                    }
                    None => return TaskState::Stopped,
                },
            }
        }
    }

    /// One reconciliation pass: read, compare, validate, apply
    pub async fn reconcile_once(&mut self) -> PassOutcome {
        let path = self.config.cert_path();
        let webhook = self.config.webhook_name.as_str();

        let bundle = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(webhook, path = %path.display(), error = %e, "Failed to read CA bundle");
                return PassOutcome::Transient;
            }
        };

        if self.last_applied_bundle.as_deref() == Some(bundle.as_slice()) {
            debug!(webhook, "CA bundle unchanged, skipping patch");
            return PassOutcome::Unchanged;
        }

        match validate_ca_bundle(&bundle) {
            Ok(count) => debug!(webhook, certificates = count, "CA bundle is valid"),
            Err(e) => {
                error!(webhook, error = %e, "The CA bundle is not valid; waiting for the next change");
                metrics::increment_invalid_bundles();
                return PassOutcome::Invalid;
            }
        }

        match self.gateway.apply_ca_bundle(webhook, &bundle).await {
            Ok(()) => {
                info!(webhook, bytes = bundle.len(), "Applied CA bundle to webhook");
                metrics::increment_patches();
                self.last_applied_bundle = Some(bundle);
                PassOutcome::Applied
            }
            Err(e) => {
                error!(webhook, error = %e, "Failed to patch webhook");
                metrics::increment_patch_errors(e.reason());
                if e.is_not_found()
                    && self.settings.missing_on_apply == WebhookAbsencePolicy::Terminate
                {
                    PassOutcome::NotFound
                } else {
                    PassOutcome::Transient
                }
            }
        }
    }

    fn set_state(&self, next: TaskState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(webhook = self.config.webhook_name.as_str(), from = %current, to = %next, "Reconciler state change");
            *current = next;
            true
        });
    }
}

async fn retry_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Control handle for a spawned [`ReconcilerTask`]
///
/// Cancelling is idempotent. Dropping the handle cancels the task too, so a
/// task never outlives its owner.
pub struct ReconcilerHandle {
    webhook_name: String,
    cancel: CancellationToken,
    state: watch::Receiver<TaskState>,
    join: Option<JoinHandle<TaskState>>,
}

impl std::fmt::Debug for ReconcilerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcilerHandle")
            .field("webhook_name", &self.webhook_name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ReconcilerHandle {
    #[must_use]
    pub fn webhook_name(&self) -> &str {
        &self.webhook_name
    }

    /// Latest state published by the task
    #[must_use]
    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state.clone()
    }

    /// Signal the task to stop without waiting for it
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel the task and wait until its loop has exited and released the watcher
    pub async fn stop(mut self) -> TaskState {
        self.shutdown().await
    }

    /// Cancel the task and wait for it to exit, keeping the handle
    ///
    /// Cancel safe: if this future is dropped early the join handle stays in
    /// place and a later call waits for the same exit.
    pub async fn shutdown(&mut self) -> TaskState {
        self.cancel.cancel();
        let Some(join) = self.join.as_mut() else {
            return self.state();
        };
        let result = join.await;
        self.join = None;
        match result {
            Ok(state) => state,
            Err(e) => {
                error!(webhook = self.webhook_name.as_str(), error = %e, "Reconciler task panicked");
                TaskState::Stopped
            }
        }
    }
}

impl Drop for ReconcilerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
