use std::sync::{Arc, LazyLock};

use anyhow::Context;
use serde::Deserialize;
use tokio::{io::AsyncRead, sync::broadcast};
use tracing::warn;
use waypost_alert::{AlertConfig, Notifier};
use waypost_archive::{ArchiveConfig, Archiver};
use waypost_common::{Signal, internal, logging, message::InboundMessage};
use waypost_forward::{RelayConfig, SmtpRelay};
use waypost_routing::RoutingTable;

use crate::{
    dispatch::{Disposition, Dispatcher},
    server::{HttpConfig, IngestServer},
};

/// Top-level configuration, read from `waypost.config.ron`
#[derive(Debug, Default, Deserialize)]
pub struct Waypost {
    #[serde(default)]
    pub routing: RoutingTable,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    tokio::signal::ctrl_c().await?;
    internal!(level = WARN, "Forcing shutdown");

    Ok(())
}

impl Waypost {
    /// Parse a RON configuration and apply environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is not valid RON for this
    /// structure.
    pub fn from_ron(config: &str) -> anyhow::Result<Self> {
        let mut waypost: Self = ron::from_str(config).context("Invalid configuration")?;
        waypost.alert.apply_env();
        Ok(waypost)
    }

    /// Assemble the dispatcher from the relay, archive and alert sections
    ///
    /// # Errors
    ///
    /// Returns an error if the archive location is rejected or the HTTP
    /// client for alerts cannot be built.
    pub fn dispatcher(&self) -> anyhow::Result<Dispatcher> {
        let store = self
            .archive
            .clone()
            .into_store()
            .context("Failed to initialise archive")?;
        let notifier = Notifier::new(&self.alert).context("Failed to initialise alerting")?;

        if notifier.endpoint().is_none() {
            warn!("No alert webhook configured, delivery failures will only be logged");
        }
        if self.routing.is_empty() {
            warn!("Routing table is empty, every message will be unroutable");
        }

        Ok(Dispatcher::new(
            Arc::new(SmtpRelay::new(self.relay.clone())),
            Archiver::new(store),
            notifier,
        ))
    }

    /// Run the HTTP server until SIGINT or SIGTERM
    ///
    /// # Errors
    ///
    /// This function will return an error if any component fails to
    /// initialise, or the server fails while running.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        let dispatcher = Arc::new(self.dispatcher()?);
        let server = IngestServer::new(&self.http, dispatcher, Arc::new(self.routing)).await?;

        internal!(level = INFO, "Controller running");

        let ret = tokio::select! {
            r = server.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                r.map_err(anyhow::Error::from)
            }
            r = shutdown() => {
                r
            }
        };

        internal!(level = INFO, "Shutting down...");

        ret
    }

    /// Dispatch a single message read from `reader`
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher cannot be built or the header block
    /// of the message cannot be read. Delivery failures are not errors; they
    /// are reported through the returned [`Disposition`].
    pub async fn deliver<R>(&self, from: &str, to: &str, reader: R) -> anyhow::Result<Disposition>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let dispatcher = self.dispatcher()?;
        let message = InboundMessage::from_reader(from, to, reader)
            .await
            .context("Failed to read message")?;

        Ok(dispatcher.handle(&message, &self.routing).await)
    }
}
