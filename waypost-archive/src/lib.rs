//! Backup of messages that could not be forwarded.
//!
//! The [`Archiver`] turns an [`InboundMessage`](waypost_common::message::InboundMessage)
//! into a write-once [`BackupRecord`] and hands it to an [`ArchiveStore`].
//! Archiving is best effort: failures come back as
//! [`ArchiveOutcome::Failed`] and are never raised to the caller.

pub mod archiver;
pub mod backends;
pub mod config;
pub mod error;
pub mod r#trait;
pub mod types;

pub use archiver::{ArchiveOutcome, Archiver};
pub use backends::{FileArchiveStore, MemoryArchiveStore};
pub use config::ArchiveConfig;
pub use error::{ArchiveError, Result, ValidationError};
pub use r#trait::ArchiveStore;
pub use types::{BackupKey, BackupMetadata, BackupRecord, RFC822_CONTENT_TYPE};
