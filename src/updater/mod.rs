//! # CA Bundle Updater
//!
//! The reconciliation engine: validation, directory watching, the per-target
//! task and the supervisor that swaps targets.

pub mod bundle;
pub mod supervisor;
pub mod task;
pub mod types;
pub mod watcher;

pub use bundle::validate_ca_bundle;
pub use supervisor::{ReconcilerSupervisor, SupervisorStatus};
pub use task::{ReconcilerHandle, ReconcilerTask};
pub use types::{
    FailureReason, PassOutcome, ReconcilerConfig, TaskSettings, TaskState, WebhookAbsencePolicy,
};
pub use watcher::{DirectoryWatcher, WatchSignal};
