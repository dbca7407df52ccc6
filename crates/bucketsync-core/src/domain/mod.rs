//! Domain entities and business logic
//!
//! This module contains the core domain types for bucketsync:
//! - Newtypes for validated domain values (sync root, object key, bucket name)
//! - The path to object key mapping
//! - Filesystem change events as consumed by the sync loop
//! - Transfer outcomes reported after every upload or deletion
//! - Domain-specific error types

pub mod errors;
pub mod event;
pub mod keymap;
pub mod newtypes;
pub mod outcome;

// Re-export commonly used types
pub use errors::DomainError;
pub use event::{ChangeEvent, ChangeKind, WatchSignal};
pub use keymap::to_object_key;
pub use newtypes::{BucketName, ObjectKey, SyncRoot};
pub use outcome::{TransferDirection, TransferOutcome, TransferResult};
