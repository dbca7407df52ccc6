//! Reconciler - the startup pass that uploads every local file
//!
//! The pass is additive only: every regular file under the sync root is
//! uploaded unconditionally, and nothing is ever deleted remotely. Failing
//! to list a directory aborts the pass; a single file failing to upload
//! does not.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bucketsync_core::domain::TransferOutcome;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::transfer::TransferExecutor;
use crate::SyncError;

/// Default number of uploads in flight during reconciliation
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

// ============================================================================
// ReconcileReport
// ============================================================================

/// Summary of a reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// One outcome per regular file found
    pub outcomes: Vec<TransferOutcome>,
    /// Number of successful uploads
    pub uploaded: usize,
    /// Number of failed uploads
    pub failed: usize,
    /// Total bytes uploaded
    pub bytes: u64,
    /// Wall-clock duration of the pass
    pub duration_ms: u64,
}

impl ReconcileReport {
    fn from_outcomes(outcomes: Vec<TransferOutcome>, duration_ms: u64) -> Self {
        let uploaded = outcomes.iter().filter(|o| o.is_success()).count();
        let bytes = outcomes.iter().map(TransferOutcome::bytes).sum();
        Self {
            failed: outcomes.len() - uploaded,
            outcomes,
            uploaded,
            bytes,
            duration_ms,
        }
    }

    /// Returns true if every upload succeeded
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Outcomes that failed
    pub fn failures(&self) -> impl Iterator<Item = &TransferOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// Walks the sync root once and uploads every regular file
pub struct Reconciler {
    executor: Arc<TransferExecutor>,
    max_concurrent: usize,
}

impl Reconciler {
    /// Creates a reconciler uploading through `executor`
    pub fn new(executor: Arc<TransferExecutor>) -> Self {
        Self {
            executor,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Sets the number of uploads allowed in flight at once (minimum 1)
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Runs the pass
    ///
    /// Every regular file reachable from the root when its directory is
    /// listed is uploaded exactly once. Directories never become objects.
    ///
    /// # Errors
    /// Returns `SyncError::Traversal` if any directory cannot be listed. No
    /// upload is started in that case.
    #[tracing::instrument(skip(self), fields(root = %self.executor.root()))]
    pub async fn reconcile(&self) -> Result<ReconcileReport, SyncError> {
        let started = Instant::now();

        let mut files = Vec::new();
        walk_directory(self.executor.root().as_path(), &mut files).await?;

        info!(
            files = files.len(),
            concurrency = self.max_concurrent,
            "Reconciliation started"
        );

        let executor = &self.executor;
        let outcomes: Vec<TransferOutcome> = stream::iter(files)
            .map(|path| async move { executor.upload(&path).await })
            .buffer_unordered(self.max_concurrent)
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await;

        let report =
            ReconcileReport::from_outcomes(outcomes, started.elapsed().as_millis() as u64);

        for failure in report.failures() {
            warn!(
                target_key = %failure.target(),
                reason = failure.failure_reason().unwrap_or_default(),
                "File not mirrored"
            );
        }

        info!(
            uploaded = report.uploaded,
            failed = report.failed,
            bytes = report.bytes,
            duration_ms = report.duration_ms,
            "Reconciliation finished"
        );

        Ok(report)
    }
}

/// Recursively collects the regular files (and symlinks to them) under `dir`
///
/// Symlinks to directories are not followed, which keeps the walk finite.
pub(crate) fn walk_directory<'a>(
    dir: &'a Path,
    files: &'a mut Vec<PathBuf>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), SyncError>> + Send + 'a>> {
    Box::pin(async move {
        let traversal = |source| SyncError::Traversal {
            path: dir.to_path_buf(),
            source,
        };

        let mut entries = tokio::fs::read_dir(dir).await.map_err(traversal)?;

        while let Some(entry) = entries.next_entry().await.map_err(traversal)? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(traversal)?;

            if file_type.is_dir() {
                walk_directory(&path, files).await?;
            } else if file_type.is_file() {
                files.push(path);
            } else if file_type.is_symlink() {
                match tokio::fs::metadata(&path).await {
                    Ok(target) if target.is_dir() => {
                        debug!(path = %path.display(), "Not following directory symlink");
                    }
                    Ok(target) if !target.is_file() => {
                        debug!(path = %path.display(), "Skipping symlink to special file");
                    }
                    // Dangling links are handed to the executor, which reports them
                    _ => files.push(path),
                }
            } else {
                debug!(path = %path.display(), "Skipping special file");
            }
        }

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use bucketsync_core::domain::{BucketName, ObjectKey, SyncRoot, TransferDirection};
    use bucketsync_store::InMemoryRemoteStore;

    use super::*;

    fn setup(dir: &tempfile::TempDir) -> (Arc<InMemoryRemoteStore>, Reconciler) {
        let root = SyncRoot::resolve(dir.path()).unwrap();
        let store = Arc::new(InMemoryRemoteStore::with_bucket(
            BucketName::new("mirror").unwrap(),
        ));
        let executor = Arc::new(TransferExecutor::new(store.clone(), root));
        (store, Reconciler::new(executor))
    }

    #[tokio::test]
    async fn test_uploads_nested_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir_all(dir.path().join("sub/empty")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"bb").unwrap();
        let (store, reconciler) = setup(&dir);

        let report = reconciler.reconcile().await.unwrap();

        assert_eq!(store.keys(), vec!["a.txt", "sub/b.txt"]);
        assert_eq!(report.uploaded, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.bytes, 3);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_empty_root_uploads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (store, reconciler) = setup(&dir);

        let report = reconciler.reconcile().await.unwrap();

        assert!(report.outcomes.is_empty());
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_failed_file_does_not_abort_pass() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }
        let (store, reconciler) = setup(&dir);
        store.fail_puts_for(ObjectKey::new("b.txt").unwrap());

        let report = reconciler.with_max_concurrent(1).reconcile().await.unwrap();

        assert_eq!(report.uploaded, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.is_clean());
        assert_eq!(report.failures().next().unwrap().target(), "b.txt");
        assert_eq!(store.keys(), vec!["a.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn test_each_file_uploaded_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..20 {
            let sub = dir.path().join(format!("d{}", i % 3));
            std::fs::create_dir_all(&sub).unwrap();
            std::fs::write(sub.join(format!("f{i}.bin")), vec![0u8; i]).unwrap();
        }
        let (store, reconciler) = setup(&dir);

        let report = reconciler.with_max_concurrent(8).reconcile().await.unwrap();

        assert_eq!(report.outcomes.len(), 20);
        assert_eq!(store.mutations().len(), 20);
        assert_eq!(store.keys().len(), 20);
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (store, reconciler) = setup(&dir);
        drop(dir);

        let err = reconciler.reconcile().await.unwrap_err();

        assert!(matches!(err, SyncError::Traversal { .. }));
        assert!(store.mutations().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_directory_symlink_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::fs::write(dir.path().join("real/x.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("loop")).unwrap();
        let (store, reconciler) = setup(&dir);

        reconciler.reconcile().await.unwrap();

        assert_eq!(store.keys(), vec!["real/x.txt"]);
    }

    #[test]
    fn test_report_counts() {
        let key = ObjectKey::new("a").unwrap();
        let outcomes = vec![
            TransferOutcome::success(
                "/r/a",
                key,
                TransferDirection::Upload,
                10,
            ),
            TransferOutcome::failure(
                "/r/b",
                None,
                TransferDirection::Upload,
                "boom",
            ),
        ];

        let report = ReconcileReport::from_outcomes(outcomes, 7);

        assert_eq!(report.uploaded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.bytes, 10);
        assert_eq!(report.duration_ms, 7);
    }
}
