//! Sync loop - consumes the settled event sequence
//!
//! [`SyncLoop`] turns each [`ChangeEvent`] into uploads or deletions:
//!
//! | Kind | Action |
//! |---|---|
//! | Created, Modified, Renamed, Moved | upload the event's path |
//! | Removed | delete the event's path |
//!
//! A directory path stands for every file below it. An upload walks the
//! local directory; a deletion removes every object under the key prefix.
//!
//! Events are handled one at a time in delivery order, so two outcomes for
//! the same key are always applied in event order. A failed transfer or a
//! watcher error is logged and counted; only the channel closing or the
//! shutdown token ends the loop.
//!
//! ## States
//!
//! ```text
//! Idle ──run()──→ Watching ──closed / shutdown──→ Closed
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bucketsync_core::domain::{
    ChangeEvent, ChangeKind, TransferDirection, TransferOutcome, WatchSignal,
};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transfer::TransferExecutor;

// ============================================================================
// State and summary types
// ============================================================================

/// Lifecycle state of a [`SyncLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Not yet consuming events
    Idle,
    /// Consuming the event sequence
    Watching,
    /// The event source closed or shutdown was requested
    Closed,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Idle => write!(f, "idle"),
            LoopState::Watching => write!(f, "watching"),
            LoopState::Closed => write!(f, "closed"),
        }
    }
}

/// Counters accumulated while the loop runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Change events received
    pub events: u64,
    /// Successful uploads
    pub uploaded: u64,
    /// Successful deletions
    pub deleted: u64,
    /// Failed uploads and deletions
    pub failed: u64,
    /// Watcher-level errors received
    pub watcher_errors: u64,
    /// Events that required no transfer (directories, the root itself)
    pub ignored: u64,
}

impl LoopSummary {
    fn record(&mut self, outcome: &TransferOutcome) {
        match (outcome.is_success(), outcome.direction) {
            (true, TransferDirection::Upload) => self.uploaded += 1,
            (true, TransferDirection::Delete) => self.deleted += 1,
            (false, _) => self.failed += 1,
        }
    }
}

/// What the loop does for an event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Upload,
    Delete,
}

/// Maps an event kind to its action
pub fn classify(kind: ChangeKind) -> SyncAction {
    if kind.is_upsert() {
        SyncAction::Upload
    } else {
        SyncAction::Delete
    }
}

// ============================================================================
// SyncLoop
// ============================================================================

/// Single consumer of the change-event sequence
pub struct SyncLoop {
    executor: Arc<TransferExecutor>,
    delete_renamed_source: bool,
    state: watch::Sender<LoopState>,
}

impl SyncLoop {
    /// Creates an idle loop dispatching to `executor`
    pub fn new(executor: Arc<TransferExecutor>) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            executor,
            delete_renamed_source: false,
            state,
        }
    }

    /// When enabled, the source key of a rename or move is deleted once the
    /// destination has been uploaded
    pub fn with_delete_renamed_source(mut self, enabled: bool) -> Self {
        self.delete_renamed_source = enabled;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition
    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Consumes `signals` until the channel closes or `shutdown` is cancelled
    ///
    /// A loop runs at most once; calling `run` on a loop that is not idle
    /// returns an empty summary immediately.
    pub async fn run(
        &self,
        mut signals: mpsc::Receiver<WatchSignal>,
        shutdown: CancellationToken,
    ) -> LoopSummary {
        let mut summary = LoopSummary::default();

        if self.state() != LoopState::Idle {
            warn!(state = %self.state(), "Sync loop already started");
            return summary;
        }

        self.state.send_replace(LoopState::Watching);
        info!(root = %self.executor.root(), "Watching for changes");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, sync loop stopping");
                    break;
                }

                signal = signals.recv() => match signal {
                    Some(WatchSignal::Event(event)) => {
                        summary.events += 1;
                        let outcomes = self.handle(&event).await;
                        if outcomes.is_empty() {
                            summary.ignored += 1;
                        }
                        for outcome in &outcomes {
                            summary.record(outcome);
                        }
                    }
                    Some(WatchSignal::Error(message)) => {
                        summary.watcher_errors += 1;
                        warn!(error = %message, "Watcher error");
                    }
                    None => {
                        info!("Change event source closed");
                        break;
                    }
                },
            }
        }

        self.state.send_replace(LoopState::Closed);
        info!(
            events = summary.events,
            uploaded = summary.uploaded,
            deleted = summary.deleted,
            failed = summary.failed,
            watcher_errors = summary.watcher_errors,
            ignored = summary.ignored,
            "Sync loop closed"
        );

        summary
    }

    /// Applies a single event and returns the outcomes it produced
    ///
    /// Returns an empty vector for events needing no transfer: events on the
    /// sync root itself and uploads of empty directories.
    pub async fn handle(&self, event: &ChangeEvent) -> Vec<TransferOutcome> {
        if event.path == self.executor.root().as_path() {
            debug!(kind = %event.kind, "Ignoring event on the sync root itself");
            return Vec::new();
        }

        debug!(path = %event.path.display(), kind = %event.kind, "Handling change event");

        match classify(event.kind) {
            SyncAction::Delete => self.executor.delete_tree(&event.path).await,
            SyncAction::Upload => {
                let mut outcomes = self.executor.upload_tree(&event.path).await;
                if outcomes.is_empty() {
                    return outcomes;
                }

                if let Some(previous) = &event.previous {
                    let cleanup = self
                        .handle_rename_source(previous, &event.path, &outcomes)
                        .await;
                    outcomes.extend(cleanup);
                }
                outcomes
            }
        }
    }

    async fn handle_rename_source(
        &self,
        previous: &Path,
        destination: &Path,
        uploaded: &[TransferOutcome],
    ) -> Vec<TransferOutcome> {
        if !self.delete_renamed_source {
            warn!(
                from = %previous.display(),
                to = %destination.display(),
                "Renamed path uploaded; objects for the old path are left in place"
            );
            return Vec::new();
        }

        if !uploaded.iter().all(TransferOutcome::is_success) {
            debug!(from = %previous.display(), "Keeping old objects, an upload failed");
            return Vec::new();
        }

        self.executor.delete_tree(previous).await
    }
}
