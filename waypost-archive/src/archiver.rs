//! Best-effort backup of a message that could not be forwarded

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};
use waypost_common::{message::InboundMessage, time::iso8601};

use crate::{
    ArchiveError,
    r#trait::ArchiveStore,
    types::{BackupKey, BackupMetadata, BackupRecord, RFC822_CONTENT_TYPE},
};

/// Names tried for one backup before giving up
const MAX_KEY_ATTEMPTS: u32 = 16;

/// How an archive attempt ended
#[derive(Debug)]
pub enum ArchiveOutcome {
    /// The backup was written under this key
    Saved(BackupKey),
    /// The backup could not be written; the error has already been logged
    Failed(ArchiveError),
}

impl ArchiveOutcome {
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        matches!(self, Self::Saved(_))
    }

    #[must_use]
    pub const fn key(&self) -> Option<&BackupKey> {
        match self {
            Self::Saved(key) => Some(key),
            Self::Failed(_) => None,
        }
    }
}

/// Writes backups of undeliverable messages to an [`ArchiveStore`]
#[derive(Debug, Clone)]
pub struct Archiver {
    store: Arc<dyn ArchiveStore>,
}

impl Archiver {
    #[must_use]
    pub fn new(store: Arc<dyn ArchiveStore>) -> Self {
        Self { store }
    }

    /// Back up `message`, recording `target` as the address it was meant for
    ///
    /// Never fails: a body that cannot be read or a store that refuses the
    /// write is logged and reported as [`ArchiveOutcome::Failed`].
    pub async fn archive(&self, message: &InboundMessage, target: Option<&str>) -> ArchiveOutcome {
        match self.try_archive(message, target, Utc::now()).await {
            Ok(key) => {
                info!(
                    sender = message.from(),
                    recipient = message.to(),
                    key = %key,
                    "Email saved to archive"
                );
                ArchiveOutcome::Saved(key)
            }
            Err(e) => {
                error!(
                    sender = message.from(),
                    recipient = message.to(),
                    error = %e,
                    "Failed to save email to archive"
                );
                ArchiveOutcome::Failed(e)
            }
        }
    }

    async fn try_archive(
        &self,
        message: &InboundMessage,
        target: Option<&str>,
        now: DateTime<Utc>,
    ) -> crate::Result<BackupKey> {
        let timestamp = iso8601(now);
        let content = message.raw().bytes().await?;

        let mut record = BackupRecord {
            key: BackupKey::generate(&timestamp, message.from()),
            content,
            content_type: RFC822_CONTENT_TYPE,
            metadata: BackupMetadata::new(message, target, timestamp),
        };

        let mut attempt = 0;
        loop {
            match self.store.put(&record).await {
                Ok(()) => return Ok(record.key),
                Err(ArchiveError::AlreadyExists(_)) if attempt + 1 < MAX_KEY_ATTEMPTS => {
                    attempt += 1;
                    record.key = BackupKey::generate_nth(
                        &record.metadata.timestamp,
                        message.from(),
                        attempt,
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}
