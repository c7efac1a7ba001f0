use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;

use crate::{
    ArchiveError,
    r#trait::ArchiveStore,
    types::{BackupKey, BackupRecord},
};

/// In-memory archive store
///
/// Keeps records in a `HashMap` behind an `RwLock`. Intended for tests and
/// local development, where it doubles as an inspection point: the records
/// written can be read back with [`MemoryArchiveStore::get`].
///
/// # Capacity Management
/// An optional capacity caps the number of records. Writes beyond it fail,
/// which is also how tests simulate an unavailable store.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchiveStore {
    records: Arc<RwLock<HashMap<BackupKey, BackupRecord>>>,
    /// Maximum number of records to keep (None = unlimited)
    capacity: Option<usize>,
}

impl MemoryArchiveStore {
    /// Create a new empty store with unlimited capacity
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new store that refuses writes once `capacity` records exist
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Arc::default(),
            capacity: Some(capacity),
        }
    }

    /// Number of records held
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the configured capacity (None = unlimited)
    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Look up a stored record
    #[must_use]
    pub fn get(&self, key: &str) -> Option<BackupRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// All stored keys, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<BackupKey> {
        let mut keys: Vec<_> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ArchiveStore for MemoryArchiveStore {
    async fn put(&self, record: &BackupRecord) -> crate::Result<()> {
        let mut records = self.records.write()?;

        if records.contains_key(&record.key) {
            return Err(ArchiveError::AlreadyExists(record.key.to_string()));
        }

        if let Some(capacity) = self.capacity
            && records.len() >= capacity
        {
            return Err(ArchiveError::CapacityExceeded {
                len: records.len(),
                capacity,
            });
        }

        records.insert(record.key.clone(), record.clone());
        drop(records);

        Ok(())
    }
}
