//! Operator alerts for messages that could not be delivered.
//!
//! An [`AlertEvent`] describes what went wrong; the [`Notifier`] renders it as
//! a Discord-compatible embed and posts it to the configured webhook. Alerting
//! is best effort: every failure is logged and reported through
//! [`NotifyOutcome`], never raised.

pub mod config;
pub mod error;
pub mod event;
pub mod notifier;
pub mod payload;

pub use config::AlertConfig;
pub use error::AlertError;
pub use event::{AlertEvent, BackupStatus};
pub use notifier::{Notifier, NotifyOutcome};
pub use payload::{Embed, EmbedField, WebhookPayload};
