//! HTTP ingest and liveness

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use thiserror::Error;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_util::task::TaskTracker;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};
use tracing::{error, info};
use waypost_common::{Signal, incoming, message::InboundMessage};
use waypost_routing::RoutingTable;

use crate::dispatch::Dispatcher;

pub const ENVELOPE_FROM: &str = "x-envelope-from";
pub const ENVELOPE_TO: &str = "x-envelope-to";

const LIVENESS_TEXT: &str = "Waypost mail router is running";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind HTTP server to {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Address to bind, e.g. `[::]:8080` or `127.0.0.1:8080`
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Largest message accepted on `POST /messages`
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn default_listen_address() -> String {
    "[::]:8080".to_string()
}

const fn default_max_message_size() -> usize {
    25 * 1024 * 1024
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            max_message_size: default_max_message_size(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    routing: Arc<RoutingTable>,
    tasks: TaskTracker,
}

/// Build the router serving `/`, `/health/live` and `POST /messages`
///
/// Each ingested message is dispatched on a task spawned on `tasks`, so a
/// client that hangs up does not abandon the message part way through.
///
/// `routing` is read once here; a changed table takes effect on restart.
pub fn router(
    dispatcher: Arc<Dispatcher>,
    routing: Arc<RoutingTable>,
    max_message_size: usize,
    tasks: TaskTracker,
) -> Router {
    let liveness = Router::new()
        .route("/", get(liveness_handler))
        .route("/health/live", get(liveness_handler))
        .layer(TimeoutLayer::new(Duration::from_secs(1)));

    let ingest = Router::new()
        .route("/messages", post(ingest_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_message_size))
        .with_state(AppState {
            dispatcher,
            routing,
            tasks,
        });

    liveness.merge(ingest)
}

pub struct IngestServer {
    listener: TcpListener,
    router: Router,
    tasks: TaskTracker,
}

impl IngestServer {
    /// Bind the listener
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the configured address fails.
    pub async fn new(
        config: &HttpConfig,
        dispatcher: Arc<Dispatcher>,
        routing: Arc<RoutingTable>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|source| ServerError::Bind {
                address: config.listen_address.clone(),
                source,
            })?;

        info!(address = %config.listen_address, "HTTP server bound");

        let tasks = TaskTracker::new();
        Ok(Self {
            listener,
            router: router(dispatcher, routing, config.max_message_size, tasks.clone()),
            tasks,
        })
    }

    /// The address the listener is bound to
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until a shutdown signal arrives
    ///
    /// In-flight requests are allowed to finish, and so is every dispatch
    /// they started, even those whose client has already gone away.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails while running.
    pub async fn serve(self, mut shutdown: broadcast::Receiver<Signal>) -> Result<(), ServerError> {
        info!("HTTP server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                info!("HTTP server received shutdown signal");
            })
            .await?;

        self.tasks.close();
        if !self.tasks.is_empty() {
            info!(pending = self.tasks.len(), "Waiting for in-flight messages");
        }
        self.tasks.wait().await;

        info!("HTTP server stopped");
        Ok(())
    }
}

async fn liveness_handler() -> &'static str {
    LIVENESS_TEXT
}

fn envelope<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

async fn ingest_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (Some(from), Some(to)) = (
        envelope(&headers, ENVELOPE_FROM),
        envelope(&headers, ENVELOPE_TO),
    ) else {
        incoming!(level = DEBUG, "Rejected message without envelope headers");
        return (
            StatusCode::BAD_REQUEST,
            "Missing X-Envelope-From or X-Envelope-To header",
        )
            .into_response();
    };

    incoming!(
        level = DEBUG,
        "Received {} bytes from {from} for {to}",
        body.len()
    );

    let message = InboundMessage::from_bytes(from, to, body);
    let AppState {
        dispatcher,
        routing,
        tasks,
    } = state;
    let dispatch = tasks.spawn(async move {
        dispatcher.handle(&message, &routing).await.summary()
    });

    match dispatch.await {
        Ok(summary) => (StatusCode::ACCEPTED, Json(summary)).into_response(),
        Err(e) => {
            error!(error = %e, "Dispatch task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
