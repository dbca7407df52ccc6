//! Remote store port (driven/secondary port)
//!
//! This module defines the interface for interacting with the object store
//! that mirrors the sync root. The primary implementation targets
//! S3-compatible services (MinIO, AWS S3, Cloudflare R2), but the trait is
//! provider-agnostic.
//!
//! ## Design Notes
//!
//! - A store instance is bound to exactly one bucket; the bucket name is
//!   part of the adapter's configuration, not of every call.
//! - No in-process cache of remote state is kept: every call is a fresh
//!   round trip, so a single instance can be shared (`Arc`) between the
//!   reconciliation pass and the watch loop without locking.
//! - Errors are a typed [`StoreError`] so callers can tell a missing object
//!   apart from a transport failure.
//! - Object content is handed over as a stream with a known length. An
//!   adapter may hold at most one part of it in memory at a time.

use thiserror::Error;
use tokio::io::AsyncRead;

use crate::domain::newtypes::{BucketName, ObjectKey};

/// Readable object content passed to [`IRemoteStore::put_object`]
pub type ObjectBody = Box<dyn AsyncRead + Send + Unpin>;

/// Errors that can occur when talking to the remote store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The bucket or object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials were rejected or lack permission
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The request could not be delivered (DNS, TCP, TLS, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with an error
    #[error("Service error {code}: {message}")]
    Service {
        /// Service-specific error code (e.g. `BucketAlreadyExists`)
        code: String,
        /// Human-readable message from the service
        message: String,
    },

    /// The request was rejected before being sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The object content could not be read from its source
    #[error("Source read failed: {0}")]
    Source(String),
}

impl StoreError {
    /// Returns true if the error means the target does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Port trait for object storage operations
///
/// ## Implementation Notes
///
/// - `put_object` overwrites any existing object with the same key; calling
///   it twice with the same content is idempotent.
/// - `put_object` reads `body` front to back exactly once. Byte progress is
///   observed by wrapping the body, not by the store.
/// - `list_objects` returns every key under the prefix, following
///   pagination until the listing is complete.
/// - `delete_object` on a missing key may either succeed (S3 semantics) or
///   return [`StoreError::NotFound`]; callers must tolerate both.
/// - Implementations must not retry internally beyond what the underlying
///   transport does by default.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// The bucket this store writes to
    fn bucket(&self) -> &BucketName;

    /// Checks whether the bucket exists
    async fn bucket_exists(&self) -> Result<bool, StoreError>;

    /// Creates the bucket
    async fn create_bucket(&self) -> Result<(), StoreError>;

    /// Streams `body` into the object stored under `key`
    ///
    /// # Arguments
    /// * `key` - The object key
    /// * `body` - The object content, read to the end
    /// * `size` - Number of bytes `body` yields; a shorter body is an error
    async fn put_object(
        &self,
        key: &ObjectKey,
        body: ObjectBody,
        size: u64,
    ) -> Result<(), StoreError>;

    /// Removes the object stored under `key`
    async fn delete_object(&self, key: &ObjectKey) -> Result<(), StoreError>;

    /// Lists the keys of all objects whose key starts with `prefix`
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectKey>, StoreError>;
}
