//! Configuration module for bucketsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, merging with command-line flags, validation, defaults, and a
//! builder pattern for programmatic use.
//!
//! The merged configuration is an immutable value constructed once at startup
//! and handed by reference to every component that needs it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::newtypes::BucketName;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for bucketsync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub watch: WatchConfig,
    pub transfer: TransferConfig,
    pub logging: LoggingConfig,
}

/// Object store connection settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Host (and optional port) of the S3-compatible endpoint, without scheme.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    /// Bucket mirroring the local folder. Created on startup if absent.
    pub bucket: String,
    /// Connect over HTTPS instead of HTTP.
    pub use_ssl: bool,
    /// Signing region. Most self-hosted services accept the default.
    pub region: String,
}

/// Local folder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Local folder mirrored onto the bucket.
    pub folder: PathBuf,
    /// Upload every file under `folder` before watching starts.
    pub reconcile_on_start: bool,
    /// Delete the source key after a rename or move has been uploaded.
    pub delete_renamed_source: bool,
}

/// Change watcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Milliseconds between deliveries of settled change events.
    pub poll_interval_ms: u64,
    /// Milliseconds a path must stay quiet before its change is delivered.
    pub debounce_ms: u64,
}

/// Upload settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Maximum concurrent uploads during reconciliation.
    pub max_concurrent: u32,
    /// Files at or above this size (in MiB) use multipart upload.
    pub multipart_threshold_mb: u64,
    /// Size of each multipart part (in MiB). S3 requires at least 5.
    pub part_size_mb: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &redact(&self.secret_key))
            .field("bucket", &self.bucket)
            .field("use_ssl", &self.use_ssl)
            .field("region", &self.region)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "********"
    }
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return [`Config::default`].
    ///
    /// Unlike [`Config::load_or_default`], a file that exists but cannot be
    /// read or parsed is an error.
    pub fn load_optional(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/bucketsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("bucketsync")
            .join("config.yaml")
    }

    /// Returns a copy safe to print, with the secret key masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.remote.secret_key = redact(&self.remote.secret_key).to_string();
        copy
    }

    /// The configured bucket as a validated [`BucketName`].
    pub fn bucket_name(&self) -> Result<BucketName, DomainError> {
        BucketName::new(self.remote.bucket.clone())
    }

    /// Part size for multipart uploads in bytes, saturating at `u64::MAX`.
    pub fn part_size_bytes(&self) -> u64 {
        mebibytes(self.transfer.part_size_mb)
    }

    /// Multipart threshold in bytes, saturating at `u64::MAX`.
    pub fn multipart_threshold_bytes(&self) -> u64 {
        mebibytes(self.transfer.multipart_threshold_mb)
    }
}

fn mebibytes(mb: u64) -> u64 {
    mb.saturating_mul(1024 * 1024)
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

// Config derives Default because all its fields implement Default.

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            use_ssl: false,
            region: "us-east-1".to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::new(),
            reconcile_on_start: true,
            delete_renamed_source: false,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            debounce_ms: 500,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            multipart_threshold_mb: 64,
            part_size_mb: 8,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merging with command-line flags
// ---------------------------------------------------------------------------

/// Values supplied on the command line.
///
/// A flag that is `None` or blank leaves the file value in place; a
/// non-blank flag replaces it. `use_ssl` is enabled if either side enables it.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: Option<String>,
    pub folder: Option<PathBuf>,
    pub use_ssl: bool,
    pub region: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    /// Merge command-line values over this (file-derived) configuration.
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(v) = non_blank(&overrides.endpoint) {
            self.remote.endpoint = v.to_string();
        }
        if let Some(v) = non_blank(&overrides.access_key) {
            self.remote.access_key = v.to_string();
        }
        if let Some(v) = non_blank(&overrides.secret_key) {
            self.remote.secret_key = v.to_string();
        }
        if let Some(v) = non_blank(&overrides.bucket) {
            self.remote.bucket = v.to_string();
        }
        if let Some(v) = non_blank(&overrides.region) {
            self.remote.region = v.to_string();
        }
        if let Some(folder) = overrides
            .folder
            .as_ref()
            .filter(|f| !f.as_os_str().is_empty())
        {
            self.sync.folder = folder.clone();
        }
        self.remote.use_ssl = self.remote.use_ssl || overrides.use_ssl;
        self
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"remote.bucket"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

/// Smallest part size S3 accepts for all but the last part.
const MIN_PART_SIZE_MB: u64 = 5;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- required ---
        for (field, value) in [
            ("remote.endpoint", &self.remote.endpoint),
            ("remote.access_key", &self.remote.access_key),
            ("remote.secret_key", &self.remote.secret_key),
            ("remote.bucket", &self.remote.bucket),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError::new(field, "is required"));
            }
        }
        if self.sync.folder.as_os_str().is_empty() {
            errors.push(ValidationError::new("sync.folder", "is required"));
        }

        // --- remote ---
        if self.remote.endpoint.contains("://") {
            errors.push(ValidationError::new(
                "remote.endpoint",
                "must be host[:port] without a scheme; set remote.use_ssl for HTTPS",
            ));
        }
        if !self.remote.bucket.trim().is_empty() {
            if let Err(e) = self.bucket_name() {
                errors.push(ValidationError::new("remote.bucket", e.to_string()));
            }
        }
        if self.remote.region.trim().is_empty() {
            errors.push(ValidationError::new("remote.region", "must not be empty"));
        }

        // --- watch ---
        if self.watch.poll_interval_ms == 0 {
            errors.push(ValidationError::new(
                "watch.poll_interval_ms",
                "must be greater than 0",
            ));
        }

        // --- transfer ---
        if self.transfer.max_concurrent == 0 {
            errors.push(ValidationError::new(
                "transfer.max_concurrent",
                "must be greater than 0",
            ));
        }
        if self.transfer.multipart_threshold_mb == 0 {
            errors.push(ValidationError::new(
                "transfer.multipart_threshold_mb",
                "must be greater than 0",
            ));
        }
        if self.transfer.part_size_mb < MIN_PART_SIZE_MB {
            errors.push(ValidationError::new(
                "transfer.part_size_mb",
                format!("must be at least {MIN_PART_SIZE_MB}"),
            ));
        }
        if self.transfer.part_size_mb > self.transfer.multipart_threshold_mb
            && self.transfer.multipart_threshold_mb > 0
        {
            errors.push(ValidationError::new(
                "transfer.part_size_mb",
                "must not exceed transfer.multipart_threshold_mb",
            ));
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::new(
                "logging.level",
                format!(
                    "invalid level '{}'; expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError::new(
                "logging.format",
                format!(
                    "invalid format '{}'; expected one of: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            ));
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use bucketsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .remote_endpoint("localhost:9000")
///     .remote_credentials("minio", "minio123")
///     .remote_bucket("backups")
///     .sync_folder("/srv/data")
///     .build();
/// assert!(config.validate().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- remote ---

    pub fn remote_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.remote.endpoint = endpoint.into();
        self
    }

    pub fn remote_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.config.remote.access_key = access_key.into();
        self.config.remote.secret_key = secret_key.into();
        self
    }

    pub fn remote_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.remote.bucket = bucket.into();
        self
    }

    pub fn remote_use_ssl(mut self, use_ssl: bool) -> Self {
        self.config.remote.use_ssl = use_ssl;
        self
    }

    pub fn remote_region(mut self, region: impl Into<String>) -> Self {
        self.config.remote.region = region.into();
        self
    }

    // --- sync ---

    pub fn sync_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.config.sync.folder = folder.into();
        self
    }

    pub fn sync_reconcile_on_start(mut self, enabled: bool) -> Self {
        self.config.sync.reconcile_on_start = enabled;
        self
    }

    pub fn sync_delete_renamed_source(mut self, enabled: bool) -> Self {
        self.config.sync.delete_renamed_source = enabled;
        self
    }

    // --- watch ---

    pub fn watch_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.watch.poll_interval_ms = ms;
        self
    }

    pub fn watch_debounce_ms(mut self, ms: u64) -> Self {
        self.config.watch.debounce_ms = ms;
        self
    }

    // --- transfer ---

    pub fn transfer_max_concurrent(mut self, n: u32) -> Self {
        self.config.transfer.max_concurrent = n;
        self
    }

    pub fn transfer_multipart_threshold_mb(mut self, mb: u64) -> Self {
        self.config.transfer.multipart_threshold_mb = mb;
        self
    }

    pub fn transfer_part_size_mb(mut self, mb: u64) -> Self {
        self.config.transfer.part_size_mb = mb;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
