//! Forwarding through a fixed SMTP relay

use async_trait::async_trait;
use tracing::{info, warn};
use waypost_common::message::InboundMessage;

use crate::{
    Forwarder, RelayConfig,
    client::{self, Response, SmtpClient},
    error::ForwardError,
};

/// Hands each message to the configured relay in its own SMTP session
///
/// The envelope sender is kept; the resolved target becomes the only
/// recipient. Content is sent byte for byte, headers untouched.
#[derive(Debug, Clone)]
pub struct SmtpRelay {
    config: RelayConfig,
}

impl SmtpRelay {
    #[must_use]
    pub const fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Run one step of the conversation under the configured timeout
    async fn step<T>(
        &self,
        stage: &'static str,
        fut: impl Future<Output = client::Result<T>>,
    ) -> Result<T, ForwardError> {
        tokio::time::timeout(self.config.timeout(), fut)
            .await
            .map_err(|_| ForwardError::Timeout {
                stage,
                secs: self.config.timeout_secs,
            })?
            .map_err(ForwardError::from)
    }

    fn expect(
        stage: &'static str,
        response: &Response,
        accept: fn(&Response) -> bool,
    ) -> Result<(), ForwardError> {
        if accept(response) {
            Ok(())
        } else {
            Err(ForwardError::Rejected {
                stage,
                code: response.code,
                message: response.message(),
            })
        }
    }

    async fn connect_and_greet(&self) -> Result<SmtpClient, ForwardError> {
        let address = self.config.address();

        let mut client = tokio::time::timeout(
            self.config.timeout(),
            SmtpClient::connect(&address, self.config.host.as_str()),
        )
        .await
        .map_err(|_| ForwardError::Timeout {
            stage: "connect",
            secs: self.config.timeout_secs,
        })?
        .map_err(|source| ForwardError::Connect {
            address: address.clone(),
            source,
        })?
        .accept_invalid_certs(self.config.accept_invalid_certs);

        let greeting = self.step("greeting", client.read_greeting()).await?;
        Self::expect("connection", &greeting, Response::is_success)?;

        Ok(client)
    }

    /// EHLO (falling back to HELO), then STARTTLS when required
    async fn handshake(&self, client: &mut SmtpClient) -> Result<(), ForwardError> {
        let helo = self.config.helo.as_str();

        let ehlo = self.step("EHLO", client.ehlo(helo)).await?;
        let capabilities = if ehlo.is_success() {
            Some(ehlo)
        } else {
            let response = self.step("HELO", client.helo(helo)).await?;
            Self::expect("HELO", &response, Response::is_success)?;
            None
        };

        if !self.config.starttls {
            return Ok(());
        }

        if !capabilities.is_some_and(|ehlo| ehlo.has_capability("STARTTLS")) {
            return Err(ForwardError::TlsUnavailable);
        }

        let response = self.step("STARTTLS", client.starttls()).await?;
        Self::expect("STARTTLS", &response, Response::is_success)?;

        let response = self.step("EHLO", client.ehlo(helo)).await?;
        Self::expect("EHLO", &response, Response::is_success)
    }

    async fn transaction(
        &self,
        client: &mut SmtpClient,
        from: &str,
        target: &str,
        content: &[u8],
    ) -> Result<(), ForwardError> {
        let response = self.step("MAIL FROM", client.mail_from(from)).await?;
        Self::expect("MAIL FROM", &response, Response::is_success)?;

        let response = self.step("RCPT TO", client.rcpt_to(target)).await?;
        Self::expect("RCPT TO", &response, Response::is_success)?;

        let response = self.step("DATA", client.data()).await?;
        Self::expect("DATA", &response, Response::is_intermediate)?;

        let response = self.step("message content", client.send_data(content)).await?;
        Self::expect("message content", &response, Response::is_success)
    }
}

#[async_trait]
impl Forwarder for SmtpRelay {
    async fn forward(&self, message: &InboundMessage, target: &str) -> Result<(), ForwardError> {
        let content = message.raw().bytes().await?;

        if self.config.accept_invalid_certs {
            warn!(
                relay = %self.config.address(),
                "TLS certificate validation is disabled for this relay"
            );
        }

        let mut client = self.connect_and_greet().await?;
        self.handshake(&mut client).await?;
        self.transaction(&mut client, message.from(), target, &content)
            .await?;

        // The relay has taken responsibility for the message at this point.
        if let Err(e) = self.step("QUIT", client.quit()).await {
            warn!(relay = %self.config.address(), error = %e, "QUIT failed after delivery");
        }

        info!(
            sender = message.from(),
            recipient = message.to(),
            target = %target,
            relay = %self.config.address(),
            bytes = content.len(),
            "Message forwarded"
        );

        Ok(())
    }
}
