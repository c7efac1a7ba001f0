use chrono::Utc;
use tracing::{error, info, warn};
use waypost_common::{outgoing, time::iso8601};

use crate::{AlertConfig, AlertError, event::AlertEvent, payload::WebhookPayload};

/// How a notification attempt ended
#[derive(Debug)]
pub enum NotifyOutcome {
    /// The webhook accepted the alert
    Sent,
    /// No endpoint is configured, nothing was sent
    Disabled,
    /// The alert could not be delivered; the error has already been logged
    Failed(AlertError),
}

impl NotifyOutcome {
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Posts [`AlertEvent`]s to a webhook
#[derive(Debug, Clone)]
pub struct Notifier {
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl Notifier {
    /// Create a notifier for the endpoint in `config`
    ///
    /// # Errors
    /// If the HTTP client cannot be initialised
    pub fn new(config: &AlertConfig) -> Result<Self, AlertError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("waypost/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint().map(str::to_string),
            client,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Send `event` to the webhook
    ///
    /// Makes at most one request and never retries.
    pub async fn notify(&self, event: &AlertEvent) -> NotifyOutcome {
        let Some(endpoint) = self.endpoint.as_deref() else {
            warn!(
                sender = %event.from,
                recipient = %event.to,
                error = %event.error,
                "Alert webhook not configured, skipping notification"
            );
            return NotifyOutcome::Disabled;
        };

        let payload = WebhookPayload::from_event(event, &iso8601(Utc::now()));

        match self.send(endpoint, &payload).await {
            Ok(()) => {
                info!(
                    sender = %event.from,
                    recipient = %event.to,
                    "Alert sent successfully"
                );
                NotifyOutcome::Sent
            }
            Err(e) => {
                error!(
                    sender = %event.from,
                    recipient = %event.to,
                    error = %e,
                    "Failed to send alert"
                );
                NotifyOutcome::Failed(e)
            }
        }
    }

    async fn send(&self, endpoint: &str, payload: &WebhookPayload) -> Result<(), AlertError> {
        outgoing!("POST {endpoint}");

        let response = self.client.post(endpoint).json(payload).send().await?;
        let status = response.status();

        outgoing!("Webhook responded {status}");

        if !status.is_success() {
            return Err(AlertError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        Ok(())
    }
}
