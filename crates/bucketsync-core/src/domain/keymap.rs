//! Local path to object key mapping
//!
//! The key of a file is its path relative to the sync root, with the
//! relative components joined by `/` regardless of the platform separator.
//! The mapping is pure and deterministic: the same path always yields the
//! same key, and two distinct paths under the same root never collide.

use std::path::{Component, Path};

use super::errors::DomainError;
use super::newtypes::{ObjectKey, SyncRoot};

/// Object-store key delimiter
pub const KEY_DELIMITER: char = '/';

/// Maps an absolute local path under `root` to its object key
///
/// # Errors
/// - `DomainError::PathNotInSyncRoot` if `path` is not strictly below `root`
/// - `DomainError::InvalidPath` if a component is not valid UTF-8 or is a
///   `.`/`..` component
/// - `DomainError::InvalidObjectKey` if the resulting key is too long
pub fn to_object_key(root: &SyncRoot, path: &Path) -> Result<ObjectKey, DomainError> {
    if !root.contains(path) {
        return Err(DomainError::PathNotInSyncRoot(format!(
            "{} is not within {}",
            path.display(),
            root
        )));
    }

    let relative = path.strip_prefix(root.as_path()).map_err(|_| {
        DomainError::PathNotInSyncRoot(format!("{} is not within {}", path.display(), root))
    })?;

    let mut key = String::new();
    for component in relative.components() {
        let Component::Normal(segment) = component else {
            return Err(DomainError::InvalidPath(format!(
                "Unexpected component in {}",
                path.display()
            )));
        };

        let segment = segment.to_str().ok_or_else(|| {
            DomainError::InvalidPath(format!("Path is not valid UTF-8: {}", path.display()))
        })?;

        if !key.is_empty() {
            key.push(KEY_DELIMITER);
        }
        key.push_str(segment);
    }

    ObjectKey::new(key)
}
