//! Filesystem change events
//!
//! A [`ChangeEvent`] is produced by the watcher for a path under the sync
//! root and consumed exactly once by the sync loop. Events are never
//! persisted.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// The kind of change observed on a watched path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A new file or directory appeared
    Created,
    /// An existing file's content or metadata changed
    Modified,
    /// A file was renamed within the same directory
    Renamed,
    /// A file was moved to a different directory (or into the tree)
    Moved,
    /// A file or directory disappeared
    Removed,
}

impl ChangeKind {
    /// Returns true for kinds that carry content to upload
    #[must_use]
    pub fn is_upsert(&self) -> bool {
        !matches!(self, ChangeKind::Removed)
    }
}

impl Display for ChangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Renamed => "renamed",
            ChangeKind::Moved => "moved",
            ChangeKind::Removed => "removed",
        };
        write!(f, "{s}")
    }
}

/// A single change notification for a path under the sync root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// What happened
    pub kind: ChangeKind,
    /// The absolute path the change applies to (destination for renames)
    pub path: PathBuf,
    /// Source path of a rename or move, when the watcher knows it
    pub previous: Option<PathBuf>,
    /// Best-effort time at which the watcher observed the change
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Creates an event of the given kind observed now
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            previous: None,
            timestamp: Utc::now(),
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Created, path)
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Modified, path)
    }

    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Removed, path)
    }

    /// Creates a rename/move event from `from` to `to`
    ///
    /// The kind is `Renamed` when both paths share a parent directory and
    /// `Moved` otherwise.
    pub fn relocated(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        let from = from.into();
        let to = to.into();
        let kind = if from.parent() == to.parent() {
            ChangeKind::Renamed
        } else {
            ChangeKind::Moved
        };

        Self {
            kind,
            path: to,
            previous: Some(from),
            timestamp: Utc::now(),
        }
    }

    /// Returns the path the event applies to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A message delivered by the watcher to the sync loop
///
/// The third signal of the watcher interface, "closed", is the channel
/// itself closing: a receiver that yields `None` has reached the end of
/// the event sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// A settled change event
    Event(ChangeEvent),
    /// A watcher-level error (the watch itself keeps running)
    Error(String),
}
