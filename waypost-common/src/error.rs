//! Error types for the waypost-common crate.

use std::io;

use thiserror::Error;

/// Errors that can occur while reading an inbound message's raw content.
#[derive(Debug, Error)]
pub enum RawBodyError {
    /// Reading the underlying stream failed.
    #[error("Failed to read raw message: {0}")]
    Io(#[from] io::Error),

    /// The one-shot stream was taken by an earlier read that did not finish.
    #[error("Raw message stream has already been consumed")]
    Consumed,
}

impl RawBodyError {
    /// Returns `true` if the body can never be read again.
    #[must_use]
    pub const fn is_consumed(&self) -> bool {
        matches!(self, Self::Consumed)
    }
}
