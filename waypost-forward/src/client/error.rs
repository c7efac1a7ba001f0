use std::io;

use thiserror::Error;

/// Errors raised by the SMTP client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network read or write failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The server sent something that is not an SMTP reply.
    #[error("Failed to parse SMTP response: {0}")]
    ParseError(String),

    /// The TLS handshake could not be completed.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// The server closed the connection.
    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    /// The reply was not valid UTF-8.
    #[error("UTF-8 error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
