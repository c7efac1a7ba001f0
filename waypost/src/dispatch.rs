//! Per-message routing decision and failure handling
//!
//! ```text
//! START ─┬─ no route ──────► notify ─────────────────────► DONE
//!        └─ resolved ─┬─ forward ok ─────────────────────► DONE
//!                     └─ forward failed ─► archive ─► notify ─► DONE
//! ```
//!
//! Each message is handled exactly once. Nothing is retried or re-queued,
//! and sink failures are contained at the sink.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use waypost_alert::{AlertEvent, BackupStatus, Notifier, NotifyOutcome};
use waypost_archive::{ArchiveOutcome, Archiver};
use waypost_common::{incoming, message::InboundMessage};
use waypost_forward::{ForwardError, Forwarder};
use waypost_routing::{RoutingTable, resolve};

/// Terminal state reached for one message, with the outcome of each sink
#[derive(Debug)]
pub enum Disposition {
    Forwarded {
        target: String,
    },
    NoRoute {
        notify: NotifyOutcome,
    },
    ForwardFailed {
        target: String,
        error: ForwardError,
        archive: ArchiveOutcome,
        notify: NotifyOutcome,
    },
}

/// Wire-friendly view of a [`Disposition`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum DispositionSummary {
    Forwarded {
        target: String,
    },
    NoRoute {
        alerted: bool,
    },
    ForwardFailed {
        target: String,
        error: String,
        backup_key: Option<String>,
        alerted: bool,
    },
}

impl Disposition {
    #[must_use]
    pub fn summary(&self) -> DispositionSummary {
        match self {
            Self::Forwarded { target } => DispositionSummary::Forwarded {
                target: target.clone(),
            },
            Self::NoRoute { notify } => DispositionSummary::NoRoute {
                alerted: notify.is_sent(),
            },
            Self::ForwardFailed {
                target,
                error,
                archive,
                notify,
            } => DispositionSummary::ForwardFailed {
                target: target.clone(),
                error: error.to_string(),
                backup_key: archive.key().map(ToString::to_string),
                alerted: notify.is_sent(),
            },
        }
    }
}

/// Routes each message to its target, falling back to archive and alert
#[derive(Debug, Clone)]
pub struct Dispatcher {
    forwarder: Arc<dyn Forwarder>,
    archiver: Archiver,
    notifier: Notifier,
}

impl Dispatcher {
    #[must_use]
    pub fn new(forwarder: Arc<dyn Forwarder>, archiver: Archiver, notifier: Notifier) -> Self {
        Self {
            forwarder,
            archiver,
            notifier,
        }
    }

    /// Handle one message against `table`
    ///
    /// Never fails. The archive step always completes before the alert for
    /// the same message is sent.
    pub async fn handle(&self, message: &InboundMessage, table: &RoutingTable) -> Disposition {
        incoming!(
            level = DEBUG,
            "Dispatching message from {} to {}",
            message.from(),
            message.to()
        );

        let Some(route) = resolve(message.to(), table) else {
            let error = format!("No routing rule found for recipient: {}", message.to());
            warn!(
                sender = message.from(),
                recipient = message.to(),
                "{error}"
            );

            let notify = self
                .notifier
                .notify(&AlertEvent::no_route(message, error))
                .await;
            return Disposition::NoRoute { notify };
        };

        let target = route.target;
        info!(
            sender = message.from(),
            recipient = message.to(),
            target = %target,
            selector = %route.selector,
            "Forwarding message"
        );

        let Err(error) = self.forwarder.forward(message, target).await else {
            return Disposition::Forwarded {
                target: target.to_string(),
            };
        };

        error!(
            sender = message.from(),
            recipient = message.to(),
            target = %target,
            error = %error,
            "Failed to forward message"
        );

        let archive = self.archiver.archive(message, Some(target)).await;
        let backup = match &archive {
            ArchiveOutcome::Saved(key) => BackupStatus::Saved(key.to_string()),
            ArchiveOutcome::Failed(e) => BackupStatus::Failed(e.to_string()),
        };

        let notify = self
            .notifier
            .notify(&AlertEvent::forward_failed(
                message,
                target,
                error.to_string(),
                backup,
            ))
            .await;

        Disposition::ForwardFailed {
            target: target.to_string(),
            error,
            archive,
            notify,
        }
    }
}
