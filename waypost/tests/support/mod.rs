//! Test doubles for dispatcher and ingest tests
//!
//! The forwarder, archive store and webhook all append to one shared
//! [`EventLog`], so tests can assert the order the sinks ran in.

pub mod mock_webhook;
pub mod recording;

pub use mock_webhook::MockWebhook;
pub use recording::{EventLog, RecordingForwarder, RecordingStore};
