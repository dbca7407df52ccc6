//! bucketsync Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `SyncRoot`, `ObjectKey`, `BucketName`, `ChangeEvent`, `TransferOutcome`
//! - **Key mapping** - the pure translation from a local path to an object key
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `IProgressReporter`
//! - **Configuration** - YAML file loading, flag merging and validation
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O beyond
//! resolving the sync root. Ports define trait interfaces that adapter
//! crates implement (`bucketsync-store` for the remote store) and that the
//! sync engine (`bucketsync-sync`) consumes.

pub mod config;
pub mod domain;
pub mod ports;
