//! Transfer executor - uploads and deletions against the remote store
//!
//! [`TransferExecutor`] is the error-isolation boundary of the engine: every
//! failure (unmappable path, unreadable file, store error) is logged and
//! turned into a `Failure` [`TransferOutcome`]. Nothing it does can end the
//! reconciliation pass or the sync loop.
//!
//! Files are streamed from disk; [`ProgressReader`] counts the bytes the
//! store pulls and reports them to the [`IProgressReporter`]. A change to a
//! directory is expanded into one transfer per file below it.

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use bucketsync_core::domain::{
    to_object_key, ObjectKey, SyncRoot, TransferDirection, TransferOutcome,
};
use bucketsync_core::ports::{IProgressReporter, IRemoteStore};
use tokio::io::{AsyncRead, ReadBuf};
use tracing::{debug, error, info, warn};

use crate::reconciler::walk_directory;

/// Bytes between two `advanced` progress reports
const PROGRESS_STEP: u64 = 1024 * 1024;

// ============================================================================
// TracingProgress
// ============================================================================

/// Progress reporter that writes upload progress to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl IProgressReporter for TracingProgress {
    fn started(&self, key: &ObjectKey, total: u64) {
        debug!(key = %key, total, "Upload started");
    }

    fn advanced(&self, key: &ObjectKey, sent: u64, total: u64) {
        let percent = if total == 0 { 100 } else { sent * 100 / total };
        debug!(key = %key, sent, total, percent, "Upload progress");
    }

    fn finished(&self, key: &ObjectKey, success: bool) {
        debug!(key = %key, success, "Upload finished");
    }
}

// ============================================================================
// ProgressReader
// ============================================================================

/// Reader adapter reporting how many bytes have been read so far
///
/// `advanced` fires every [`PROGRESS_STEP`] bytes and once more when the
/// expected total is reached.
struct ProgressReader<R> {
    inner: R,
    key: ObjectKey,
    total: u64,
    sent: u64,
    reported: u64,
    progress: Arc<dyn IProgressReporter>,
}

impl<R> ProgressReader<R> {
    fn new(inner: R, key: ObjectKey, total: u64, progress: Arc<dyn IProgressReporter>) -> Self {
        Self {
            inner,
            key,
            total,
            sent: 0,
            reported: 0,
            progress,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;

        let read = (buf.filled().len() - before) as u64;
        this.sent += read;
        if read > 0 && (this.sent - this.reported >= PROGRESS_STEP || this.sent >= this.total) {
            this.reported = this.sent;
            this.progress.advanced(&this.key, this.sent, this.total);
        }
        Poll::Ready(Ok(()))
    }
}

// ============================================================================
// TransferExecutor
// ============================================================================

/// Performs single uploads and deletions against the remote store
pub struct TransferExecutor {
    store: Arc<dyn IRemoteStore>,
    root: SyncRoot,
    progress: Arc<dyn IProgressReporter>,
}

impl std::fmt::Debug for TransferExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferExecutor")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl TransferExecutor {
    /// Creates an executor that logs progress through `tracing`
    pub fn new(store: Arc<dyn IRemoteStore>, root: SyncRoot) -> Self {
        Self {
            store,
            root,
            progress: Arc::new(TracingProgress),
        }
    }

    /// Replaces the progress reporter
    pub fn with_progress(mut self, progress: Arc<dyn IProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// The sync root paths are mapped against
    pub fn root(&self) -> &SyncRoot {
        &self.root
    }

    /// Uploads the file at `path` to its object key
    ///
    /// Symlinks are followed. Returns `None` without touching the store when
    /// `path` is a directory or another non-regular file: those are never
    /// represented remotely.
    ///
    /// The file is streamed, never read into memory as a whole. At most one
    /// `put_object` call is made; a failure is not retried.
    #[tracing::instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn upload(&self, path: &Path) -> Option<TransferOutcome> {
        let key = match to_object_key(&self.root, path) {
            Ok(key) => key,
            Err(e) => {
                error!(error = %e, "Cannot map path to object key");
                return Some(TransferOutcome::failure(
                    path,
                    None,
                    TransferDirection::Upload,
                    e.to_string(),
                ));
            }
        };

        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) => {
                error!(key = %key, error = %e, "Cannot stat file");
                return Some(TransferOutcome::failure(
                    path,
                    Some(key),
                    TransferDirection::Upload,
                    format!("cannot stat file: {e}"),
                ));
            }
        };

        if metadata.is_dir() {
            debug!("Skipping directory");
            return None;
        }
        if !metadata.is_file() {
            warn!(key = %key, "Skipping special file");
            return None;
        }

        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                error!(key = %key, error = %e, "Cannot open file");
                return Some(TransferOutcome::failure(
                    path,
                    Some(key),
                    TransferDirection::Upload,
                    format!("cannot open file: {e}"),
                ));
            }
        };

        let size = metadata.len();
        self.progress.started(&key, size);

        let body = ProgressReader::new(file, key.clone(), size, Arc::clone(&self.progress));

        match self.store.put_object(&key, Box::new(body), size).await {
            Ok(()) => {
                self.progress.finished(&key, true);
                info!(key = %key, bytes = size, "Uploaded");
                Some(TransferOutcome::success(
                    path,
                    key,
                    TransferDirection::Upload,
                    size,
                ))
            }
            Err(e) => {
                self.progress.finished(&key, false);
                error!(key = %key, error = %e, "Upload failed");
                Some(TransferOutcome::failure(
                    path,
                    Some(key),
                    TransferDirection::Upload,
                    e.to_string(),
                ))
            }
        }
    }

    /// Uploads `path`, expanding a directory into every file below it
    ///
    /// Files are uploaded one after another in path order. Directory
    /// symlinks are not followed. A directory that cannot be listed becomes
    /// a single failure outcome.
    #[tracing::instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn upload_tree(&self, path: &Path) -> Vec<TransferOutcome> {
        let is_dir = tokio::fs::symlink_metadata(path)
            .await
            .is_ok_and(|m| m.is_dir());
        if !is_dir {
            return self.upload(path).await.into_iter().collect();
        }

        let mut files = Vec::new();
        if let Err(e) = walk_directory(path, &mut files).await {
            error!(error = %e, "Cannot expand directory");
            return vec![TransferOutcome::failure(
                path,
                to_object_key(&self.root, path).ok(),
                TransferDirection::Upload,
                e.to_string(),
            )];
        }
        files.sort();

        info!(files = files.len(), "Uploading directory contents");
        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            outcomes.extend(self.upload(&file).await);
        }
        outcomes
    }

    /// Deletes the object mapped from `path`, or every object below it
    ///
    /// The key is derived from the path alone; the local path is usually
    /// already gone, so the remote listing decides: if
    /// any object lives under `<key>/`, each of those is deleted; otherwise
    /// the exact key is. When the listing fails, the exact key is still
    /// deleted and the listing failure is reported as its own outcome.
    #[tracing::instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn delete_tree(&self, path: &Path) -> Vec<TransferOutcome> {
        let key = match to_object_key(&self.root, path) {
            Ok(key) => key,
            Err(e) => {
                error!(error = %e, "Cannot map path to object key");
                return vec![TransferOutcome::failure(
                    path,
                    None,
                    TransferDirection::Delete,
                    e.to_string(),
                )];
            }
        };

        let prefix = format!("{key}/");
        match self.store.list_objects(&prefix).await {
            Ok(children) if !children.is_empty() => {
                info!(prefix, objects = children.len(), "Deleting directory contents");
                let mut outcomes = Vec::with_capacity(children.len());
                for child in children {
                    let local = self.root.as_path().join(child.as_str());
                    outcomes.push(self.delete_key(&local, child).await);
                }
                outcomes
            }
            Ok(_) => vec![self.delete_key(path, key).await],
            Err(e) => {
                error!(prefix, error = %e, "Cannot list objects below path");
                let listing = TransferOutcome::failure(
                    path,
                    Some(key.clone()),
                    TransferDirection::Delete,
                    format!("cannot list {prefix}: {e}"),
                );
                vec![listing, self.delete_key(path, key).await]
            }
        }
    }

    /// A key that does not exist remotely counts as deleted
    async fn delete_key(&self, path: &Path, key: ObjectKey) -> TransferOutcome {
        match self.store.delete_object(&key).await {
            Ok(()) => {
                info!(key = %key, "Deleted");
                TransferOutcome::success(path, key, TransferDirection::Delete, 0)
            }
            Err(e) if e.is_not_found() => {
                debug!(key = %key, "Object already absent");
                TransferOutcome::success(path, key, TransferDirection::Delete, 0)
            }
            Err(e) => {
                error!(key = %key, error = %e, "Delete failed");
                TransferOutcome::failure(path, Some(key), TransferDirection::Delete, e.to_string())
            }
        }
    }
}
