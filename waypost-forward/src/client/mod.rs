//! Minimal SMTP client for relaying one message per connection.
//!
//! Supports plain TCP with an optional STARTTLS upgrade. Responses are parsed
//! incrementally, so multi-line replies split across reads are handled.

mod error;
mod response;
mod smtp_client;

pub use error::{ClientError, Result};
pub use response::{Response, ResponseLine};
pub use smtp_client::{SmtpClient, dot_stuff};
