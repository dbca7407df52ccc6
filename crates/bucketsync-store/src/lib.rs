//! bucketsync Store - Object storage adapters
//!
//! Implements the [`IRemoteStore`] port for:
//! - S3-compatible services (MinIO, AWS S3, Cloudflare R2, ...) via `aws-sdk-s3`
//! - An in-memory store with an operation journal and failure injection,
//!   used to exercise the sync engine without a network
//!
//! ## Modules
//!
//! - [`s3`] - `S3RemoteStore`, single-request and multipart uploads
//! - [`memory`] - `InMemoryRemoteStore`

pub mod memory;
pub mod s3;

use bucketsync_core::ports::{IRemoteStore, StoreError};
use tracing::info;

pub use memory::{InMemoryRemoteStore, StoreOperation};
pub use s3::S3RemoteStore;

/// What [`ensure_bucket`] found or did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    /// The bucket was already there
    Existed,
    /// The bucket was missing and has been created
    Created,
}

/// Makes sure the store's bucket exists, creating it if needed
///
/// Logs one line describing the result.
///
/// # Errors
/// Returns the store error if the existence check or the creation fails.
/// Either is fatal at startup.
pub async fn ensure_bucket(store: &dyn IRemoteStore) -> Result<BucketStatus, StoreError> {
    let bucket = store.bucket().as_str();

    if store.bucket_exists().await? {
        info!(bucket, "Bucket already exists");
        return Ok(BucketStatus::Existed);
    }

    store.create_bucket().await?;
    info!(bucket, "Bucket created");
    Ok(BucketStatus::Created)
}
