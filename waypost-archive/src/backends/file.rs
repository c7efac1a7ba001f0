use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use tokio::fs;
use waypost_common::internal;

use crate::{
    ArchiveError, ValidationError,
    r#trait::ArchiveStore,
    types::{BackupKey, BackupRecord},
};

const METADATA_SUFFIX: &str = ".meta.json";
const TEMP_PREFIX: &str = ".tmp_";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Paths an archive directory may never live under
const SYSTEM_PREFIXES: [&str; 9] = [
    "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc", "/dev",
];

/// File-based archive store
///
/// Each backup becomes two files in one directory:
/// - `{key}`: the raw message, byte for byte
/// - `{key}.meta.json`: content type and [`BackupMetadata`](crate::BackupMetadata)
///
/// # Atomicity
/// Both files are written to uniquely named `.tmp_` files first. The data file
/// is then hard-linked to its final name, which fails if the name is taken, so
/// two writers can never claim the same key. The metadata is renamed into
/// place last: readers that only look at completed `.meta.json` files never
/// see a half-written backup.
#[derive(Debug, Clone)]
pub struct FileArchiveStore {
    path: PathBuf,
}

impl Default for FileArchiveStore {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/waypost/archive"),
        }
    }
}

impl FileArchiveStore {
    /// Create a store rooted at `path`
    ///
    /// # Errors
    /// If the path fails [`FileArchiveStore::validate_path`]
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ValidationError> {
        let path = path.into();
        Self::validate_path(&path)?;
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate an archive path
    ///
    /// - Rejects paths containing `..`
    /// - Rejects relative paths
    /// - Rejects system directories
    ///
    /// # Errors
    /// Returns an error if the path is invalid or potentially dangerous
    pub fn validate_path(path: &Path) -> Result<(), ValidationError> {
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(ValidationError::ParentTraversal(path.display().to_string()));
        }

        if !path.is_absolute() {
            return Err(ValidationError::NotAbsolute(path.display().to_string()));
        }

        if let Some(prefix) = SYSTEM_PREFIXES
            .iter()
            .copied()
            .find(|prefix| path.starts_with(prefix))
        {
            return Err(ValidationError::SystemDirectory {
                prefix,
                path: path.display().to_string(),
            });
        }

        Ok(())
    }

    /// Create the archive directory if it doesn't exist
    ///
    /// Also removes temporary files left behind by an interrupted write.
    ///
    /// # Errors
    /// - If the directory cannot be created
    /// - If the path exists but is not a directory
    pub fn init(&self) -> crate::Result<()> {
        internal!("Initialising archive at {}", self.path.display());

        if !self.path.try_exists()? {
            internal!("{} does not exist, creating...", self.path.display());
            std::fs::create_dir_all(&self.path)?;
        } else if !self.path.is_dir() {
            return Err(ValidationError::NotDirectory(self.path.display().to_string()).into());
        }

        self.cleanup_temp_files()
    }

    fn cleanup_temp_files(&self) -> crate::Result<()> {
        let mut cleaned = 0;

        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                std::fs::remove_file(entry.path())?;
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            internal!(
                level = INFO,
                "Cleaned up {cleaned} partial backups from {}",
                self.path.display()
            );
        }

        Ok(())
    }

    fn data_path(&self, key: &BackupKey) -> PathBuf {
        self.path.join(key.as_str())
    }

    fn metadata_path(&self, key: &BackupKey) -> PathBuf {
        self.path.join(format!("{key}{METADATA_SUFFIX}"))
    }

    /// A temp name no other write in any process will pick
    fn temp_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        path.with_file_name(format!("{TEMP_PREFIX}{name}.{}.{n}", std::process::id()))
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Sidecar<'a> {
    content_type: &'a str,
    #[serde(flatten)]
    metadata: &'a crate::BackupMetadata,
}

#[async_trait]
impl ArchiveStore for FileArchiveStore {
    async fn put(&self, record: &BackupRecord) -> crate::Result<()> {
        record.key.validate()?;

        let data_path = self.data_path(&record.key);
        let meta_path = self.metadata_path(&record.key);

        if fs::try_exists(&meta_path).await? {
            return Err(ArchiveError::AlreadyExists(record.key.to_string()));
        }

        let sidecar = serde_json::to_vec_pretty(&Sidecar {
            content_type: record.content_type,
            metadata: &record.metadata,
        })?;

        let temp_data_path = Self::temp_path(&data_path);
        fs::write(&temp_data_path, &record.content).await?;

        let claimed = fs::hard_link(&temp_data_path, &data_path).await;
        fs::remove_file(&temp_data_path).await?;
        match claimed {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ArchiveError::AlreadyExists(record.key.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let temp_meta_path = Self::temp_path(&meta_path);
        fs::write(&temp_meta_path, &sidecar).await?;
        fs::rename(&temp_meta_path, &meta_path).await?;

        internal!(
            level = DEBUG,
            "Archived {} bytes to {}",
            record.content.len(),
            data_path.display()
        );

        Ok(())
    }
}
