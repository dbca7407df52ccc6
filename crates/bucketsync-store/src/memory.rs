//! In-memory remote store
//!
//! A HashMap-backed [`IRemoteStore`] that records every operation it
//! receives. Failures can be injected per key, for the next N uploads, or
//! for bucket checks, which makes it the store of choice for testing the
//! sync engine's fault isolation.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use bucketsync_core::domain::{BucketName, ObjectKey};
use bucketsync_core::ports::{IRemoteStore, ObjectBody, StoreError};
use tokio::io::AsyncReadExt;

/// One call received by an [`InMemoryRemoteStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    BucketExists,
    CreateBucket,
    Put { key: String, size: u64 },
    Delete { key: String },
    List { prefix: String },
}

#[derive(Debug, Default)]
struct State {
    bucket_present: bool,
    objects: BTreeMap<ObjectKey, Vec<u8>>,
    journal: Vec<StoreOperation>,
    fail_next_puts: usize,
    failing_keys: HashSet<ObjectKey>,
    fail_bucket_checks: bool,
}

/// Remote store that keeps objects in process memory
#[derive(Debug)]
pub struct InMemoryRemoteStore {
    bucket: BucketName,
    state: Mutex<State>,
}

impl InMemoryRemoteStore {
    /// Creates a store whose bucket does not exist yet
    pub fn new(bucket: BucketName) -> Self {
        Self {
            bucket,
            state: Mutex::new(State::default()),
        }
    }

    /// Creates a store whose bucket already exists and is empty
    pub fn with_bucket(bucket: BucketName) -> Self {
        let store = Self::new(bucket);
        store.lock().bucket_present = true;
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// Returns true once the bucket exists
    pub fn bucket_is_present(&self) -> bool {
        self.lock().bucket_present
    }

    /// Stored keys in lexical order
    pub fn keys(&self) -> Vec<String> {
        self.lock()
            .objects
            .keys()
            .map(|k| k.as_str().to_string())
            .collect()
    }

    /// Content stored under `key`, if any
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        let key = ObjectKey::new(key).ok()?;
        self.lock().objects.get(&key).cloned()
    }

    /// Every operation received so far, in call order
    pub fn journal(&self) -> Vec<StoreOperation> {
        self.lock().journal.clone()
    }

    /// Only the puts and deletes from the journal
    pub fn mutations(&self) -> Vec<StoreOperation> {
        self.lock()
            .journal
            .iter()
            .filter(|op| matches!(op, StoreOperation::Put { .. } | StoreOperation::Delete { .. }))
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------------
    // Seeding and failure injection
    // ------------------------------------------------------------------------

    /// Stores an object without recording it in the journal
    pub fn seed_object(&self, key: ObjectKey, data: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        state.bucket_present = true;
        state.objects.insert(key, data.into());
    }

    /// Makes the next `count` uploads fail with a transport error
    pub fn fail_next_puts(&self, count: usize) {
        self.lock().fail_next_puts = count;
    }

    /// Makes every upload to `key` fail with a service error
    pub fn fail_puts_for(&self, key: ObjectKey) {
        self.lock().failing_keys.insert(key);
    }

    /// Makes bucket existence checks fail with a transport error
    pub fn fail_bucket_checks(&self) {
        self.lock().fail_bucket_checks = true;
    }
}

#[async_trait::async_trait]
impl IRemoteStore for InMemoryRemoteStore {
    fn bucket(&self) -> &BucketName {
        &self.bucket
    }

    async fn bucket_exists(&self) -> Result<bool, StoreError> {
        let mut state = self.lock();
        state.journal.push(StoreOperation::BucketExists);
        if state.fail_bucket_checks {
            return Err(StoreError::Transport("connection refused".to_string()));
        }
        Ok(state.bucket_present)
    }

    async fn create_bucket(&self) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.journal.push(StoreOperation::CreateBucket);
        if state.bucket_present {
            return Err(StoreError::Service {
                code: "BucketAlreadyOwnedByYou".to_string(),
                message: format!("bucket {} already exists", self.bucket),
            });
        }
        state.bucket_present = true;
        Ok(())
    }

    async fn put_object(
        &self,
        key: &ObjectKey,
        mut body: ObjectBody,
        size: u64,
    ) -> Result<(), StoreError> {
        // The lock is not held across the read
        let mut data = Vec::new();
        let read = body.read_to_end(&mut data).await;

        let mut state = self.lock();
        state.journal.push(StoreOperation::Put {
            key: key.as_str().to_string(),
            size,
        });

        if !state.bucket_present {
            return Err(StoreError::NotFound(format!("bucket {}", self.bucket)));
        }
        if state.fail_next_puts > 0 {
            state.fail_next_puts -= 1;
            return Err(StoreError::Transport("connection reset by peer".to_string()));
        }
        if state.failing_keys.contains(key) {
            return Err(StoreError::Service {
                code: "InternalError".to_string(),
                message: format!("injected failure for {key}"),
            });
        }

        let read = read.map_err(|e| StoreError::Source(e.to_string()))? as u64;
        if read != size {
            return Err(StoreError::Source(format!(
                "expected {size} bytes for {key}, read {read}"
            )));
        }

        state.objects.insert(key.clone(), data);
        Ok(())
    }

    async fn delete_object(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.journal.push(StoreOperation::Delete {
            key: key.as_str().to_string(),
        });
        if !state.bucket_present {
            return Err(StoreError::NotFound(format!("bucket {}", self.bucket)));
        }
        state.objects.remove(key);
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectKey>, StoreError> {
        let mut state = self.lock();
        state.journal.push(StoreOperation::List {
            prefix: prefix.to_string(),
        });
        if !state.bucket_present {
            return Err(StoreError::NotFound(format!("bucket {}", self.bucket)));
        }
        Ok(state
            .objects
            .keys()
            .filter(|k| k.as_str().starts_with(prefix))
            .cloned()
            .collect())
    }
}
