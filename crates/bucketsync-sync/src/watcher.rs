//! File watching and debounced change queue
//!
//! Provides a [`FileWatcher`] that wraps the `notify` crate to monitor the
//! sync root recursively, converting raw OS events into [`ChangeEvent`]
//! values.
//!
//! The [`DebouncedChangeQueue`] collects rapid-fire events and coalesces them
//! so that downstream consumers only see the final state of a path after it
//! has been quiet for a configurable debounce window.
//!
//! ## Architecture
//!
//! ```text
//! inotify / FSEvents / kqueue
//!       │
//!       ▼
//!  FileWatcher  ──→  mpsc::channel  ──→  EventScheduler (DebouncedChangeQueue)  ──→  SyncLoop
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bucketsync_core::domain::{ChangeEvent, ChangeKind, WatchSignal};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::SyncError;

/// Capacity of the raw event channel between the OS watcher and the scheduler
pub const RAW_CHANNEL_CAPACITY: usize = 1024;

// ============================================================================
// FileWatcher
// ============================================================================

/// Watches the sync root for changes using the OS-native mechanism
///
/// On Linux this uses inotify. Raw events are mapped to [`ChangeEvent`]s and
/// sent, together with watcher errors, as [`WatchSignal`]s. Dropping the
/// `FileWatcher` stops the watch and closes the channel.
///
/// ## Usage
///
/// ```ignore
/// let (mut watcher, raw_rx) = FileWatcher::new()?;
/// watcher.watch(root.as_path())?;
/// // hand raw_rx to an EventScheduler
/// drop(watcher); // stops watching, raw_rx yields None
/// ```
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    watched: Option<PathBuf>,
}

impl FileWatcher {
    /// Creates a new `FileWatcher` that is not yet watching anything
    ///
    /// # Returns
    /// The watcher and the receiver on which raw, undebounced signals arrive.
    ///
    /// # Errors
    /// Returns an error if the underlying OS watcher cannot be created
    pub fn new() -> Result<(Self, mpsc::Receiver<WatchSignal>), SyncError> {
        let (tx, rx) = mpsc::channel::<WatchSignal>(RAW_CHANNEL_CAPACITY);

        debug!("Initializing file watcher");

        // The handler runs on notify's own thread, outside the runtime, so
        // blocking_send is safe here.
        let watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| {
                let signal = match res {
                    Ok(event) => match map_notify_event(&event) {
                        Some(change) => WatchSignal::Event(change),
                        None => return,
                    },
                    Err(err) => {
                        error!(error = %err, "File watcher error");
                        WatchSignal::Error(err.to_string())
                    }
                };

                if tx.blocking_send(signal).is_err() {
                    debug!("Change receiver dropped, discarding event");
                }
            },
            notify::Config::default(),
        )?;

        Ok((
            Self {
                watcher,
                watched: None,
            },
            rx,
        ))
    }

    /// Starts watching `path` recursively
    ///
    /// # Errors
    /// Returns an error if the path cannot be watched (does not exist,
    /// insufficient permissions, or the inotify watch limit is reached).
    /// This is fatal at startup.
    pub fn watch(&mut self, path: &Path) -> Result<(), SyncError> {
        info!(path = %path.display(), "Starting recursive watch");
        self.watcher.watch(path, RecursiveMode::Recursive)?;
        self.watched = Some(path.to_path_buf());
        Ok(())
    }

    /// The path currently being watched
    pub fn watched_path(&self) -> Option<&Path> {
        self.watched.as_deref()
    }
}

// ============================================================================
// Event mapping - notify::Event → ChangeEvent
// ============================================================================

/// Converts a `notify::Event` into a [`ChangeEvent`]
///
/// Maps the notify event kinds as follows:
/// - `Create(*)` -> `Created`
/// - `Modify(Name(Both))` with 2 paths -> `Renamed` (same directory) or
///   `Moved`, with the source in `previous`
/// - `Modify(Name(To))` -> `Moved` (the source is outside the tree or unknown)
/// - `Modify(Name(From))` -> `Removed` of the source path
/// - `Modify(Name(Any | Other))` -> `Moved` if the path still exists, else `Removed`
/// - Other `Modify(*)` -> `Modified`
/// - `Remove(*)` -> `Removed`
///
/// Returns `None` for events without paths and for access or unknown kinds.
pub fn map_notify_event(event: &notify::Event) -> Option<ChangeEvent> {
    let paths = &event.paths;

    match &event.kind {
        EventKind::Create(_) => {
            let path = paths.first()?;
            debug!(path = %path.display(), "Mapped Create event");
            Some(ChangeEvent::created(path.clone()))
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if paths.len() >= 2 {
                let change = ChangeEvent::relocated(paths[0].clone(), paths[1].clone());
                debug!(
                    from = %paths[0].display(),
                    to = %paths[1].display(),
                    kind = %change.kind,
                    "Mapped rename event"
                );
                Some(change)
            } else {
                let path = paths.first()?;
                debug!(path = %path.display(), "Rename with single path, treating as Moved");
                Some(ChangeEvent::new(ChangeKind::Moved, path.clone()))
            }
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            let path = paths.first()?;
            debug!(path = %path.display(), "Mapped rename-to event");
            Some(ChangeEvent::new(ChangeKind::Moved, path.clone()))
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            let path = paths.first()?;
            debug!(path = %path.display(), "Mapped rename-from event");
            Some(ChangeEvent::removed(path.clone()))
        }

        EventKind::Modify(ModifyKind::Name(_)) => {
            // FSEvents reports both ends of a rename this way
            let path = paths.first()?;
            if path.exists() {
                Some(ChangeEvent::new(ChangeKind::Moved, path.clone()))
            } else {
                Some(ChangeEvent::removed(path.clone()))
            }
        }

        EventKind::Modify(_) => {
            let path = paths.first()?;
            debug!(path = %path.display(), kind = ?event.kind, "Mapped Modify event");
            Some(ChangeEvent::modified(path.clone()))
        }

        EventKind::Remove(_) => {
            let path = paths.first()?;
            debug!(path = %path.display(), "Mapped Remove event");
            Some(ChangeEvent::removed(path.clone()))
        }

        _ => None,
    }
}

// ============================================================================
// DebouncedChangeQueue
// ============================================================================

#[derive(Debug)]
struct PendingChange {
    event: ChangeEvent,
    updated: Instant,
    seq: u64,
}

/// Queue that coalesces rapid filesystem changes into debounced events
///
/// When multiple events arrive for the same path in quick succession, only
/// the latest one is kept and its timer is reset. Events are released (via
/// [`poll`](DebouncedChangeQueue::poll)) once they have been quiet for longer
/// than the debounce delay, in the order of their last update.
///
/// A `Renamed`/`Moved` event whose source path has a pending `Removed`
/// cancels that `Removed`: both halves describe the same rename. A later
/// upsert of the destination keeps the rename and its source path.
#[derive(Debug)]
pub struct DebouncedChangeQueue {
    pending: HashMap<PathBuf, PendingChange>,
    debounce_delay: Duration,
    next_seq: u64,
}

impl DebouncedChangeQueue {
    /// Creates a new queue with the given debounce delay
    ///
    /// # Arguments
    /// * `debounce_delay` - How long a path must be quiet before its event is released
    pub fn new(debounce_delay: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            debounce_delay,
            next_seq: 0,
        }
    }

    /// Inserts or replaces the pending event for the event's path
    pub fn push(&mut self, event: ChangeEvent) {
        self.push_at(event, Instant::now());
    }

    pub(crate) fn push_at(&mut self, mut event: ChangeEvent, now: Instant) {
        if let (ChangeKind::Renamed | ChangeKind::Moved, Some(previous)) =
            (event.kind, event.previous.as_ref())
        {
            let cancels = self
                .pending
                .get(previous)
                .is_some_and(|p| p.event.kind == ChangeKind::Removed);
            if cancels {
                debug!(path = %previous.display(), "Rename source removal folded into rename");
                self.pending.remove(previous);
            }
        }

        // A later write to a rename destination still owes the source cleanup
        if event.kind.is_upsert() && event.previous.is_none() {
            if let Some(pending) = self.pending.get(&event.path) {
                if pending.event.kind.is_upsert() && pending.event.previous.is_some() {
                    event.kind = pending.event.kind;
                    event.previous = pending.event.previous.clone();
                }
            }
        }

        debug!(path = %event.path.display(), kind = %event.kind, "Enqueuing change event");

        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(
            event.path.clone(),
            PendingChange {
                event,
                updated: now,
                seq,
            },
        );
    }

    /// Removes and returns every event that has been quiet for the debounce delay
    ///
    /// Events still inside their window stay pending.
    pub fn poll(&mut self) -> Vec<ChangeEvent> {
        self.poll_at(Instant::now())
    }

    pub(crate) fn poll_at(&mut self, now: Instant) -> Vec<ChangeEvent> {
        let delay = self.debounce_delay;
        let settled: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, p)| now.saturating_duration_since(p.updated) >= delay)
            .map(|(path, _)| path.clone())
            .collect();

        self.take(settled)
    }

    /// Removes and returns every pending event regardless of age
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        let all: Vec<PathBuf> = self.pending.keys().cloned().collect();
        self.take(all)
    }

    fn take(&mut self, paths: Vec<PathBuf>) -> Vec<ChangeEvent> {
        let mut released: Vec<PendingChange> = paths
            .into_iter()
            .filter_map(|path| self.pending.remove(&path))
            .collect();
        released.sort_by_key(|p| p.seq);

        if !released.is_empty() {
            debug!(count = released.len(), "Released settled change events");
        }

        released.into_iter().map(|p| p.event).collect()
    }

    /// Returns the number of pending (unsettled) events
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if there are no pending events
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Warns when the watch cannot keep up with the volume of changes
pub(crate) fn warn_if_lagging(queue: &DebouncedChangeQueue) {
    if queue.pending_count() >= RAW_CHANNEL_CAPACITY {
        warn!(
            pending = queue.pending_count(),
            "Large number of pending changes; events are settling slowly"
        );
    }
}
