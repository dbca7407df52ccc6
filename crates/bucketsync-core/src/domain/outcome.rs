//! Transfer outcomes
//!
//! Every upload or deletion attempted by the transfer executor produces a
//! [`TransferOutcome`]. Outcomes are ephemeral: they exist long enough to be
//! logged and counted, and are never persisted.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use super::newtypes::ObjectKey;

/// Direction of a transfer relative to the bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferDirection {
    Upload,
    Delete,
}

impl Display for TransferDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::Upload => write!(f, "upload"),
            TransferDirection::Delete => write!(f, "delete"),
        }
    }
}

/// Result of a single transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferResult {
    /// The remote store accepted the operation
    Success {
        /// Bytes sent (0 for deletions)
        bytes: u64,
    },
    /// The operation failed; it is reported once and never retried
    Failure {
        /// Human-readable failure reason
        reason: String,
    },
}

/// Outcome of one upload or deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Local path the transfer was derived from
    pub path: PathBuf,
    /// Object key, `None` only when the path could not be mapped
    pub key: Option<ObjectKey>,
    pub direction: TransferDirection,
    pub result: TransferResult,
}

impl TransferOutcome {
    /// Creates a successful outcome
    pub fn success(
        path: impl Into<PathBuf>,
        key: ObjectKey,
        direction: TransferDirection,
        bytes: u64,
    ) -> Self {
        Self {
            path: path.into(),
            key: Some(key),
            direction,
            result: TransferResult::Success { bytes },
        }
    }

    /// Creates a failed outcome
    pub fn failure(
        path: impl Into<PathBuf>,
        key: Option<ObjectKey>,
        direction: TransferDirection,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            key,
            direction,
            result: TransferResult::Failure {
                reason: reason.into(),
            },
        }
    }

    /// Returns true if the transfer succeeded
    pub fn is_success(&self) -> bool {
        matches!(self.result, TransferResult::Success { .. })
    }

    /// Bytes transferred (0 on failure)
    pub fn bytes(&self) -> u64 {
        match self.result {
            TransferResult::Success { bytes } => bytes,
            TransferResult::Failure { .. } => 0,
        }
    }

    /// Failure reason, if any
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.result {
            TransferResult::Success { .. } => None,
            TransferResult::Failure { reason } => Some(reason),
        }
    }

    /// The key if known, otherwise the local path, for display
    pub fn target(&self) -> String {
        match &self.key {
            Some(key) => key.to_string(),
            None => self.path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_outcome() {
        let key = ObjectKey::new("a.txt").unwrap();
        let outcome = TransferOutcome::success("/r/a.txt", key, TransferDirection::Upload, 42);
        assert!(outcome.is_success());
        assert_eq!(outcome.bytes(), 42);
        assert_eq!(outcome.failure_reason(), None);
        assert_eq!(outcome.target(), "a.txt");
    }

    #[test]
    fn test_failure_without_key_targets_path() {
        let outcome = TransferOutcome::failure(
            "/elsewhere/a.txt",
            None,
            TransferDirection::Delete,
            "not in root",
        );
        assert!(!outcome.is_success());
        assert_eq!(outcome.bytes(), 0);
        assert_eq!(outcome.failure_reason(), Some("not in root"));
        assert_eq!(outcome.target(), "/elsewhere/a.txt");
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(TransferDirection::Upload.to_string(), "upload");
        assert_eq!(TransferDirection::Delete.to_string(), "delete");
    }
}
