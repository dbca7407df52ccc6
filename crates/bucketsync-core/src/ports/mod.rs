//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Object storage operations (S3-compatible buckets)
//! - [`IProgressReporter`] - Byte-level progress of uploads

pub mod progress;
pub mod remote_store;

pub use progress::{IProgressReporter, NoopProgress};
pub use remote_store::{IRemoteStore, ObjectBody, StoreError};
