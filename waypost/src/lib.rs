//! Fail-safe inbound mail router.
//!
//! Every message is forwarded to the address its recipient resolves to. When
//! that is not possible the message is archived and an operator alert is
//! sent, so nothing is silently lost.

pub mod controller;
pub mod dispatch;
pub mod server;
