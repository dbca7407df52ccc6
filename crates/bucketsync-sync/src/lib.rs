//! bucketsync Sync - One-way mirroring engine
//!
//! Provides:
//! - Startup reconciliation of a local folder onto a bucket
//! - Incremental sync driven by filesystem change notifications
//! - Per-event fault isolation: a failed transfer never stops the loop
//!
//! ## Modules
//!
//! - [`watcher`] - notify adapter and debounced change queue
//! - [`scheduler`] - tick-driven delivery of settled events to the loop
//! - [`transfer`] - uploads and deletions of files and directory trees
//! - [`reconciler`] - full-tree upload pass run before watching
//! - [`engine`] - the sync loop consuming the event sequence
//!
//! ## Data flow
//!
//! ```text
//! Reconciler ──→ TransferExecutor::upload (every file, once)
//!
//! FileWatcher ──→ EventScheduler ──→ SyncLoop ──→ TransferExecutor::{upload_tree, delete_tree}
//!                 (debounce queue)
//! ```

pub mod engine;
pub mod reconciler;
pub mod scheduler;
pub mod transfer;
pub mod watcher;

use std::path::PathBuf;

use thiserror::Error;

pub use engine::{LoopState, LoopSummary, SyncLoop};
pub use reconciler::{ReconcileReport, Reconciler};
pub use scheduler::EventScheduler;
pub use transfer::{TracingProgress, TransferExecutor};
pub use watcher::{DebouncedChangeQueue, FileWatcher};

/// Errors that end a sync phase
///
/// Per-file transfer failures are never reported through this type; they
/// become `Failure` outcomes instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A directory of the sync root could not be listed
    #[error("Cannot read directory {path}: {source}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The filesystem watch could not be created or registered
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}
