//! Error types for the waypost-archive crate.

use std::io;

use thiserror::Error;
use waypost_common::error::RawBodyError;

/// Top-level archive error type.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// I/O operation failed (file write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Metadata could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The message content could not be read.
    #[error("Message content unavailable: {0}")]
    Body(#[from] RawBodyError),

    /// A record already exists under this key; records are write-once.
    #[error("Backup already exists: {0}")]
    AlreadyExists(String),

    /// The store refused the write because it is full.
    #[error("Archive capacity exceeded: {len}/{capacity} records")]
    CapacityExceeded { len: usize, capacity: usize },

    /// Archive location validation failed.
    #[error("Archive validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal error (lock poisoning, unavailable backend, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Archive location validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The path is relative.
    #[error("Archive path must be absolute: {0}")]
    NotAbsolute(String),

    /// The path contains `..` components.
    #[error("Archive path cannot contain '..' components: {0}")]
    ParentTraversal(String),

    /// The path points into a system directory.
    #[error("Archive path cannot be in system directory {prefix}: {path}")]
    SystemDirectory { prefix: &'static str, path: String },

    /// The path exists but is not a directory.
    #[error("Archive path is not a directory: {0}")]
    NotDirectory(String),

    /// A key would escape the archive directory.
    #[error("Invalid backup key: {0}")]
    InvalidKey(String),
}

/// Specialized `Result` type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

impl<T> From<std::sync::PoisonError<T>> for ArchiveError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}
