use async_trait::async_trait;

use crate::types::BackupRecord;

/// Put-by-key blob store that backups are written to
///
/// Stores only need to accept writes: there is no read, update, or delete path
/// in the router, and retention is left to whoever operates the store.
/// Records are write-once; a second `put` under an existing key must fail
/// with [`ArchiveError::AlreadyExists`](crate::ArchiveError::AlreadyExists).
#[async_trait]
pub trait ArchiveStore: Send + Sync + std::fmt::Debug {
    /// Persist a record under `record.key`
    ///
    /// # Errors
    /// If the record cannot be stored
    async fn put(&self, record: &BackupRecord) -> crate::Result<()>;
}
