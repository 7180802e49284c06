//! # Reconciler Supervisor
//!
//! Owns the single active [`ReconcilerTask`] and swaps it when a new
//! reconciliation target arrives.
//!
//! `replace` validates first and only then stops the running task, awaiting
//! its exit before the replacement is spawned. The slot is guarded by an async
//! mutex held across that whole sequence, so concurrent `replace` calls are
//! serialised and at most one task ever talks to the gateway.
//!
//! The previous handle stays in the slot until its task has exited. A caller
//! that gives up halfway leaves it there, and the next caller waits for the
//! same exit before starting anything new.

use crate::error::ConfigValidationError;
use crate::gateway::WebhookGateway;
use crate::metrics;
use crate::updater::task::{ReconcilerHandle, ReconcilerTask};
use crate::updater::types::{ReconcilerConfig, TaskSettings, TaskState};
use std::sync::Arc;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::info;

/// Snapshot of the active reconciliation target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorStatus {
    pub webhook_name: String,
    pub state: TaskState,
}

#[derive(Debug, Clone)]
struct ActiveTarget {
    webhook_name: String,
    state: watch::Receiver<TaskState>,
}

pub struct ReconcilerSupervisor {
    gateway: Arc<dyn WebhookGateway>,
    settings: TaskSettings,
    active: AsyncMutex<Option<ReconcilerHandle>>,
    published: watch::Sender<Option<ActiveTarget>>,
}

impl std::fmt::Debug for ReconcilerSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcilerSupervisor")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ReconcilerSupervisor {
    pub fn new(gateway: Arc<dyn WebhookGateway>, settings: TaskSettings) -> Self {
        Self {
            gateway,
            settings,
            active: AsyncMutex::new(None),
            published: watch::channel(None).0,
        }
    }

    /// Install a new reconciliation target
    ///
    /// On a validation error nothing changes and the running task, if any,
    /// keeps going. Later failures of the new task are only logged.
    pub async fn replace(&self, config: ReconcilerConfig) -> Result<(), ConfigValidationError> {
        config.validate()?;

        let mut active = self.active.lock().await;
        if let Some(previous) = active.as_mut() {
            let state = previous.shutdown().await;
            info!(webhook = previous.webhook_name(), state = %state, "Stopped previous reconciler");
        }

        info!(
            webhook = config.webhook_name.as_str(),
            ca_dir = %config.cert_directory.display(),
            ca_file = config.cert_file_name.as_str(),
            "Installing reconciliation target"
        );
        let task = ReconcilerTask::new(config, Arc::clone(&self.gateway), self.settings.clone());
        let handle = task.spawn();
        self.published.send_replace(Some(ActiveTarget {
            webhook_name: handle.webhook_name().to_string(),
            state: handle.subscribe(),
        }));
        *active = Some(handle);
        metrics::increment_replacements();
        Ok(())
    }

    /// Stop the active task, if any, and wait for it to exit
    ///
    /// Safe to call repeatedly.
    pub async fn stop_all(&self) {
        let mut active = self.active.lock().await;
        if let Some(handle) = active.as_mut() {
            let state = handle.shutdown().await;
            info!(webhook = handle.webhook_name(), state = %state, "Stopped reconciler");
        }
        *active = None;
        self.published.send_replace(None);
    }

    /// Current target and its state, if one has been installed
    ///
    /// Never waits on a replacement in progress; during one it reports the
    /// outgoing target.
    #[must_use]
    pub fn status(&self) -> Option<SupervisorStatus> {
        self.published.borrow().as_ref().map(|target| SupervisorStatus {
            webhook_name: target.webhook_name.clone(),
            state: *target.state.borrow(),
        })
    }
}
