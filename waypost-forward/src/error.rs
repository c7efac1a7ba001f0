use thiserror::Error;
use waypost_common::error::RawBodyError;

use crate::client::ClientError;

#[derive(Debug, Error)]
pub enum ForwardError {
    /// The message content could not be read
    #[error("Message content unavailable: {0}")]
    Body(#[from] RawBodyError),

    /// The connection to the relay failed
    #[error("Relay {address} unavailable: {source}")]
    Connect {
        address: String,
        source: ClientError,
    },

    /// The session broke down after connecting
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The relay answered a step with a refusal
    #[error("Relay rejected {stage}: {code} {message}")]
    Rejected {
        stage: &'static str,
        code: u16,
        message: String,
    },

    /// STARTTLS is required but the relay does not offer it
    #[error("Relay does not offer STARTTLS")]
    TlsUnavailable,

    /// A step took longer than the configured timeout
    #[error("Relay timed out during {stage} after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },
}
