//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! validation failures of newtypes and path-to-key mapping errors.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Path is not within the configured sync root
    #[error("Path not within sync root: {0}")]
    PathNotInSyncRoot(String),

    /// Invalid object key
    #[error("Invalid object key: {0}")]
    InvalidObjectKey(String),

    /// Invalid bucket name
    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),
}
