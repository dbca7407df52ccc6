//! Progress reporting port
//!
//! The transfer executor reports the cumulative number of bytes sent for
//! every upload. Implementations may draw a progress bar, log, or ignore
//! the updates entirely. Calls are synchronous and must return quickly;
//! they happen on the task performing the transfer.

use crate::domain::newtypes::ObjectKey;

/// Sink for byte-level upload progress
pub trait IProgressReporter: Send + Sync {
    /// An upload of `total` bytes for `key` is starting
    fn started(&self, key: &ObjectKey, total: u64);

    /// `sent` of `total` bytes for `key` have been transferred so far
    fn advanced(&self, key: &ObjectKey, sent: u64, total: u64);

    /// The upload for `key` ended, successfully or not
    fn finished(&self, key: &ObjectKey, success: bool);
}

/// Reporter that discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl IProgressReporter for NoopProgress {
    fn started(&self, _key: &ObjectKey, _total: u64) {}

    fn advanced(&self, _key: &ObjectKey, _sent: u64, _total: u64) {}

    fn finished(&self, _key: &ObjectKey, _success: bool) {}
}
