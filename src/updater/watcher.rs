//! # Directory Watcher
//!
//! Turns OS filesystem notifications for one directory into a coalesced
//! "something changed" signal.
//!
//! The signal channel holds at most one pending signal. Events arriving while
//! a signal is pending are dropped: the consumer always re-reads the file, so
//! a burst of writes collapses into a single reconciliation pass.
//!
//! A synthetic signal is queued on construction so the state already on disk
//! is reconciled without waiting for a change.

use crate::constants::WATCH_ERROR_CHANNEL_CAPACITY;
use crate::error::WatchSetupError;
use crate::metrics;
use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Item yielded by [`DirectoryWatcher::next`]
#[derive(Debug)]
pub enum WatchSignal {
    /// Files under watch may have changed
    Changed,
    /// The established watch reported an error; the watch stays up
    Error(notify::Error),
}

/// Non-recursive watch on a single directory
pub struct DirectoryWatcher {
    directory: PathBuf,
    signals: mpsc::Receiver<()>,
    errors: mpsc::Receiver<notify::Error>,
    trigger: mpsc::Sender<()>,
    watcher: RecommendedWatcher,
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

impl DirectoryWatcher {
    /// Establish a watch on `directory`
    ///
    /// Fails if the OS watch cannot be set up (missing directory, permission
    /// denied, inotify limits).
    pub fn watch(directory: &Path) -> Result<Self, WatchSetupError> {
        let (signal_tx, signals) = mpsc::channel(1);
        let (error_tx, errors) = mpsc::channel(WATCH_ERROR_CHANNEL_CAPACITY);

        let forward = signal_tx.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if is_relevant(&event.kind) {
                        // Full channel means a signal is already pending
                        let _ = forward.try_send(());
                    }
                }
                Err(err) => {
                    let _ = error_tx.try_send(err);
                }
            },
            notify::Config::default(),
        )
        .map_err(|source| WatchSetupError {
            path: directory.to_path_buf(),
            source,
        })?;

        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|source| WatchSetupError {
                path: directory.to_path_buf(),
                source,
            })?;

        info!(path = %directory.display(), "Watching certificate directory");

        let this = Self {
            directory: directory.to_path_buf(),
            signals,
            errors,
            trigger: signal_tx,
            watcher,
        };
        this.trigger();
        Ok(this)
    }

    /// Queue a synthetic change signal unless one is already pending
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Wait for the next change signal or watch error
    ///
    /// Cancel safe: dropping the future loses nothing.
    pub async fn next(&mut self) -> Option<WatchSignal> {
        tokio::select! {
            Some(()) = self.signals.recv() => Some(WatchSignal::Changed),
            Some(err) = self.errors.recv() => {
                metrics::increment_watch_errors();
                Some(WatchSignal::Error(err))
            }
            else => None,
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Release the OS watch and its forwarding thread
    pub fn stop(mut self) {
        // Unwatching first surfaces errors we can log; dropping the watcher does the rest
        if let Err(e) = self.watcher.unwatch(&self.directory) {
            debug!(path = %self.directory.display(), error = %e, "Unwatch failed during stop");
        }
        debug!(path = %self.directory.display(), "Directory watch released");
    }
}

/// Whether a filesystem event should trigger a reconciliation pass
///
/// Metadata-only changes and deletions are ignored: an atomic rotation deletes
/// the old file and then creates/renames the new one, and only the latter is
/// worth a read. Plain reads are ignored; a close after writing is kept so a
/// truncate-and-rewrite always ends with a signal.
#[must_use]
pub fn is_relevant(kind: &EventKind) -> bool {
    match kind {
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Access(access) => matches!(access, AccessKind::Close(AccessMode::Write)),
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any | EventKind::Other => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};
    use std::time::Duration;

    #[test]
    fn test_is_relevant_filters_metadata_and_removal() {
        assert!(!is_relevant(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_relevant(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Permissions
        ))));
        assert!(!is_relevant(&EventKind::Access(AccessKind::Read)));
        assert!(!is_relevant(&EventKind::Access(AccessKind::Close(
            AccessMode::Read
        ))));
    }

    #[test]
    fn test_is_relevant_accepts_writes_and_renames() {
        assert!(is_relevant(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(is_relevant(&EventKind::Modify(ModifyKind::Name(
            RenameMode::To
        ))));
        assert!(is_relevant(&EventKind::Access(AccessKind::Close(
            AccessMode::Write
        ))));
    }

    #[tokio::test]
    async fn test_initial_signal_is_emitted() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = DirectoryWatcher::watch(dir.path()).unwrap();

        let signal = tokio::time::timeout(Duration::from_secs(1), watcher.next())
            .await
            .unwrap();
        assert!(matches!(signal, Some(WatchSignal::Changed)));
        watcher.stop();
    }

    #[tokio::test]
    async fn test_signals_coalesce() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = DirectoryWatcher::watch(dir.path()).unwrap();

        // Initial signal is still pending, so these are dropped
        watcher.trigger();
        watcher.trigger();

        assert!(matches!(watcher.next().await, Some(WatchSignal::Changed)));
        let second = tokio::time::timeout(Duration::from_millis(100), watcher.next()).await;
        assert!(second.is_err(), "only one signal should have been pending");
        watcher.stop();
    }

    #[tokio::test]
    async fn test_file_write_signals() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = DirectoryWatcher::watch(dir.path()).unwrap();
        assert!(matches!(watcher.next().await, Some(WatchSignal::Changed)));

        std::fs::write(dir.path().join("ca.crt"), b"data").unwrap();

        let signal = tokio::time::timeout(Duration::from_secs(5), watcher.next())
            .await
            .unwrap();
        assert!(matches!(signal, Some(WatchSignal::Changed)));
        watcher.stop();
    }

    #[test]
    fn test_missing_directory_fails_setup() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let err = DirectoryWatcher::watch(&missing).unwrap_err();
        assert_eq!(err.path, missing);
    }
}
