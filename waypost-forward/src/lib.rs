//! Forwarding of inbound messages to their resolved target.
//!
//! The [`Forwarder`] trait is the seam the dispatcher depends on. The shipped
//! implementation, [`SmtpRelay`], hands the message unchanged to a configured
//! SMTP relay with the target as the only envelope recipient.

pub mod client;
pub mod config;
pub mod error;
pub mod relay;

use std::fmt::Debug;

use async_trait::async_trait;
use waypost_common::message::InboundMessage;

pub use config::RelayConfig;
pub use error::ForwardError;
pub use relay::SmtpRelay;

/// Delivers a message to a single target address
#[async_trait]
pub trait Forwarder: Send + Sync + Debug {
    /// Forward `message` to `target`
    ///
    /// Makes one attempt; a failure is final for this message.
    ///
    /// # Errors
    /// If the content cannot be read or the target's relay does not accept it
    async fn forward(&self, message: &InboundMessage, target: &str) -> Result<(), ForwardError>;
}
