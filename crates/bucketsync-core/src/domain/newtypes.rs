//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// SyncRoot
// ============================================================================

/// The absolute local directory mirrored onto the bucket
///
/// A `SyncRoot` is established once at startup from configuration and is
/// immutable for the lifetime of the process. It is always absolute and
/// free of `.` and `..` components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncRoot(PathBuf);

impl SyncRoot {
    /// Create a new SyncRoot, validating it is absolute
    ///
    /// The path is normalized lexically; the filesystem is not consulted.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path is not absolute or
    /// escapes the filesystem root via `..`
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(DomainError::InvalidPath(format!(
                "Sync root must be absolute: {}",
                path.display()
            )));
        }

        Ok(Self(normalize_path(&path)?))
    }

    /// Resolve a configured folder into a SyncRoot
    ///
    /// Canonicalizes the path (following symlinks, making it absolute) and
    /// checks that it is a directory whose entries can be listed.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the folder does not exist, is not
    /// a directory, or cannot be read
    pub fn resolve(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let canonical = std::fs::canonicalize(path).map_err(|e| {
            DomainError::InvalidPath(format!("Cannot resolve {}: {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(DomainError::InvalidPath(format!(
                "Sync root is not a directory: {}",
                canonical.display()
            )));
        }

        std::fs::read_dir(&canonical).map_err(|e| {
            DomainError::InvalidPath(format!("Cannot read {}: {e}", canonical.display()))
        })?;

        Self::new(canonical)
    }

    /// Get the inner path
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Returns true if `path` lies strictly below this root
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        path != self.0 && path.starts_with(&self.0)
    }
}

impl Display for SyncRoot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for SyncRoot {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Normalize a path by resolving `.` and `..` components lexically
fn normalize_path(path: &Path) -> Result<PathBuf, DomainError> {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => normalized.push(p.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(DomainError::InvalidPath(
                        "Path escapes root via ..".to_string(),
                    ));
                }
            }
            Component::Normal(c) => normalized.push(c),
        }
    }

    Ok(normalized)
}

// ============================================================================
// ObjectKey
// ============================================================================

/// Maximum length of an object key in bytes (S3 limit)
pub const MAX_OBJECT_KEY_LEN: usize = 1024;

/// A validated object key inside the bucket
///
/// Keys use `/` as the delimiter, never start with `/`, and are at most
/// [`MAX_OBJECT_KEY_LEN`] bytes of UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Create a new ObjectKey
    ///
    /// # Errors
    /// Returns `DomainError::InvalidObjectKey` if the key is empty, too long,
    /// or starts with `/`
    pub fn new(key: impl Into<String>) -> Result<Self, DomainError> {
        let key = key.into();

        if key.is_empty() {
            return Err(DomainError::InvalidObjectKey(
                "Object key cannot be empty".to_string(),
            ));
        }

        if key.len() > MAX_OBJECT_KEY_LEN {
            return Err(DomainError::InvalidObjectKey(format!(
                "Object key exceeds {MAX_OBJECT_KEY_LEN} bytes: {} bytes",
                key.len()
            )));
        }

        if key.starts_with('/') {
            return Err(DomainError::InvalidObjectKey(format!(
                "Object key must not start with '/': {key}"
            )));
        }

        Ok(Self(key))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// BucketName
// ============================================================================

/// A bucket name following the S3 naming rules
///
/// - 3 to 63 characters
/// - Lowercase letters, digits, `-` and `.`
/// - Starts and ends with a letter or digit
/// - No two adjacent periods
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketName(String);

impl BucketName {
    /// Create a new BucketName
    ///
    /// # Errors
    /// Returns `DomainError::InvalidBucketName` if the name violates the rules
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();

        if !(3..=63).contains(&name.len()) {
            return Err(DomainError::InvalidBucketName(format!(
                "{name} (must be 3-63 characters)"
            )));
        }

        let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.';
        if !name.chars().all(allowed) {
            return Err(DomainError::InvalidBucketName(format!(
                "{name} (only lowercase letters, digits, '-' and '.' are allowed)"
            )));
        }

        let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
        if !edge_ok(name.chars().next()) || !edge_ok(name.chars().last()) {
            return Err(DomainError::InvalidBucketName(format!(
                "{name} (must start and end with a letter or digit)"
            )));
        }

        if name.contains("..") {
            return Err(DomainError::InvalidBucketName(format!(
                "{name} (adjacent periods are not allowed)"
            )));
        }

        Ok(Self(name))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BucketName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BucketName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BucketName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BucketName> for String {
    fn from(name: BucketName) -> Self {
        name.0
    }
}
