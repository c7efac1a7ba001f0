pub mod error;
pub mod logging;
pub mod message;
pub mod time;

pub use tracing;

/// Process-wide lifecycle notifications, fanned out over a broadcast channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
