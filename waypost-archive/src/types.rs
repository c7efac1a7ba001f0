use std::{borrow::Borrow, fmt};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use waypost_common::message::InboundMessage;

use crate::error::ValidationError;

/// Content type recorded for every backup
pub const RFC822_CONTENT_TYPE: &str = "message/rfc822";

const KEY_PREFIX: &str = "email-backup-";
const KEY_EXTENSION: &str = ".eml";
const NO_SUBJECT: &str = "No Subject";
const UNKNOWN_TARGET: &str = "unknown";

/// Name a backup is stored under
///
/// Shaped as `email-backup-<timestamp>-<sender>.eml`, where every character of
/// the sender outside `[A-Za-z0-9]` is replaced with `_`. When that name is
/// already taken, a counter is added: `email-backup-<timestamp>-<sender>-1.eml`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BackupKey(String);

impl BackupKey {
    #[must_use]
    pub fn generate(timestamp: &str, sender: &str) -> Self {
        Self::generate_nth(timestamp, sender, 0)
    }

    /// The `attempt`th candidate name; attempt 0 is the plain name
    #[must_use]
    pub fn generate_nth(timestamp: &str, sender: &str, attempt: u32) -> Self {
        let sender: String = sender
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();

        if attempt == 0 {
            Self(format!("{KEY_PREFIX}{timestamp}-{sender}{KEY_EXTENSION}"))
        } else {
            Self(format!(
                "{KEY_PREFIX}{timestamp}-{sender}-{attempt}{KEY_EXTENSION}"
            ))
        }
    }

    /// Check that the key can be used as a single file name
    ///
    /// # Errors
    /// If the key is empty, contains a path separator or is a relative
    /// directory reference.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let key = self.0.as_str();
        if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\', '\0']) {
            return Err(ValidationError::InvalidKey(key.to_string()));
        }

        Ok(())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for BackupKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BackupKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Descriptive metadata stored alongside a backup
///
/// `original_recipient` repeats `to`; both are kept so existing consumers of
/// the metadata keep finding the field they read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub timestamp: String,
    pub original_recipient: String,
    pub target_email: String,
}

impl BackupMetadata {
    #[must_use]
    pub fn new(message: &InboundMessage, target: Option<&str>, timestamp: String) -> Self {
        Self {
            from: message.from().to_string(),
            to: message.to().to_string(),
            subject: message.subject().unwrap_or(NO_SUBJECT).to_string(),
            timestamp,
            original_recipient: message.to().to_string(),
            target_email: target.unwrap_or(UNKNOWN_TARGET).to_string(),
        }
    }
}

/// A write-once backup: key, raw content, content type, and metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub key: BackupKey,
    pub content: Bytes,
    pub content_type: &'static str,
    pub metadata: BackupMetadata,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_key_sanitizes_sender() {
        let key = BackupKey::generate("2024-03-01T09:30:05.000Z", "test@example.com");
        assert_eq!(
            key.as_str(),
            "email-backup-2024-03-01T09:30:05.000Z-test_example_com.eml"
        );
        assert!(key.validate().is_ok());
    }

    #[test]
    fn test_key_counter_keeps_shape() {
        assert_eq!(
            BackupKey::generate_nth("2024-03-01T09:30:05.000Z", "a@b.c", 0),
            BackupKey::generate("2024-03-01T09:30:05.000Z", "a@b.c")
        );
        assert_eq!(
            BackupKey::generate_nth("2024-03-01T09:30:05.000Z", "a@b.c", 2).as_str(),
            "email-backup-2024-03-01T09:30:05.000Z-a_b_c-2.eml"
        );
    }

    #[test]
    fn test_key_sanitizes_path_characters() {
        let key = BackupKey::generate("ts", "../../etc/passwd+ünï@x");
        assert_eq!(key.as_str(), "email-backup-ts-______etc_passwd__n__x.eml");
        assert!(key.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_separators() {
        assert!(BackupKey("a/b".to_string()).validate().is_err());
        assert!(BackupKey("..".to_string()).validate().is_err());
        assert!(BackupKey(String::new()).validate().is_err());
    }

    #[test]
    fn test_metadata_defaults() {
        let message = InboundMessage::from_bytes(
            "test@example.com",
            "user1@yourdomain.com",
            Bytes::from_static(b"\r\nno headers here"),
        );

        let metadata = BackupMetadata::new(&message, None, "ts".to_string());
        assert_eq!(
            metadata,
            BackupMetadata {
                from: "test@example.com".to_string(),
                to: "user1@yourdomain.com".to_string(),
                subject: "No Subject".to_string(),
                timestamp: "ts".to_string(),
                original_recipient: "user1@yourdomain.com".to_string(),
                target_email: "unknown".to_string(),
            }
        );
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let message = InboundMessage::from_bytes(
            "a@b.c",
            "d@e.f",
            Bytes::from_static(b"Subject: Hello\r\n\r\n"),
        );
        let metadata = BackupMetadata::new(&message, Some("t@p.com"), "ts".to_string());

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["originalRecipient"], "d@e.f");
        assert_eq!(json["targetEmail"], "t@p.com");
        assert_eq!(json["subject"], "Hello");
    }
}
