use std::fmt;

use waypost_common::message::InboundMessage;

const NO_SUBJECT: &str = "No Subject";

/// What happened to the backup of the message being alerted on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupStatus {
    /// Saved under the given key
    Saved(String),
    /// Attempted and failed for the given reason
    Failed(String),
    /// Not attempted because the recipient had no route
    NoRoute,
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saved(key) => write!(f, "✅ Email saved to backup ({key})"),
            Self::Failed(reason) => write!(f, "⚠️ Backup failed: {reason}"),
            Self::NoRoute => f.write_str("❌ No routing rule found"),
        }
    }
}

/// A delivery failure worth telling an operator about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    pub from: String,
    pub to: String,
    pub subject: String,
    /// Address the message was supposed to go to; absent when unroutable
    pub target: Option<String>,
    pub error: String,
    pub backup: BackupStatus,
}

impl AlertEvent {
    /// The recipient matched no routing rule
    #[must_use]
    pub fn no_route(message: &InboundMessage, error: impl Into<String>) -> Self {
        Self::from_message(message, None, error.into(), BackupStatus::NoRoute)
    }

    /// Forwarding to `target` failed with `error`
    #[must_use]
    pub fn forward_failed(
        message: &InboundMessage,
        target: &str,
        error: impl Into<String>,
        backup: BackupStatus,
    ) -> Self {
        Self::from_message(message, Some(target.to_string()), error.into(), backup)
    }

    fn from_message(
        message: &InboundMessage,
        target: Option<String>,
        error: String,
        backup: BackupStatus,
    ) -> Self {
        Self {
            from: message.from().to_string(),
            to: message.to().to_string(),
            subject: message.subject().unwrap_or(NO_SUBJECT).to_string(),
            target,
            error,
            backup,
        }
    }
}
