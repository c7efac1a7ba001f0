use std::{path::PathBuf, sync::Arc};

use serde::Deserialize;

use crate::{
    backends::{FileArchiveStore, MemoryArchiveStore},
    r#trait::ArchiveStore,
};

/// Configuration for the archive backing store
///
/// # Examples
///
/// File-backed archive in RON config:
/// ```ron
/// Waypost (
///     archive: File(
///         path: "/var/lib/waypost/archive",
///     ),
/// )
/// ```
///
/// Memory-backed archive with capacity limit:
/// ```ron
/// Waypost (
///     archive: Memory(
///         capacity: Some(1000),
///     ),
/// )
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum ArchiveConfig {
    /// Directory of `.eml` files with JSON metadata sidecars (production)
    File { path: PathBuf },
    /// In-process storage (testing/development); contents are lost on exit
    Memory {
        /// Maximum number of records to keep (omit for unlimited)
        #[serde(default)]
        capacity: Option<usize>,
    },
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self::File {
            path: FileArchiveStore::default().path().to_path_buf(),
        }
    }
}

impl ArchiveConfig {
    /// Get the filesystem path for file-backed archives, if applicable
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::File { path } => Some(path),
            Self::Memory { .. } => None,
        }
    }

    /// Build the configured store
    ///
    /// File-backed stores are validated and their directory is created.
    ///
    /// # Errors
    /// If the path is rejected or the directory cannot be prepared
    pub fn into_store(self) -> crate::Result<Arc<dyn ArchiveStore>> {
        match self {
            Self::File { path } => {
                let store = FileArchiveStore::new(path)?;
                store.init()?;
                Ok(Arc::new(store))
            }
            Self::Memory { capacity } => Ok(capacity.map_or_else(
                || Arc::new(MemoryArchiveStore::new()) as Arc<dyn ArchiveStore>,
                |capacity| Arc::new(MemoryArchiveStore::with_capacity(capacity)),
            )),
        }
    }
}
