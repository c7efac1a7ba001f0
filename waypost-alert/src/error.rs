use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    /// The HTTP client could not be built or the request never completed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The webhook answered with a non-success status
    #[error("Webhook failed: {code} {reason}")]
    Status { code: u16, reason: String },
}
