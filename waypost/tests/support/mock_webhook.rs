//! Mock alert webhook
//!
//! Binds an axum server to `127.0.0.1:0`, answers every `POST /webhook` with a
//! fixed status, records what it was sent and notes each request in the
//! shared [`EventLog`].
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    routing::post,
};
use tokio::{net::TcpListener, sync::oneshot};

use super::recording::EventLog;

/// A request the webhook received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub content_type: Option<String>,
    pub body: serde_json::Value,
}

struct HookState {
    status: StatusCode,
    requests: Mutex<Vec<RecordedRequest>>,
    log: EventLog,
}

pub struct MockWebhook {
    addr: SocketAddr,
    state: Arc<HookState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockWebhook {
    /// Start a webhook that answers with `status`
    pub async fn start(status: StatusCode, log: EventLog) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock webhook");
        let addr = listener.local_addr().expect("local addr");

        let state = Arc::new(HookState {
            status,
            requests: Mutex::default(),
            log,
        });

        let router = Router::new()
            .route("/webhook", post(record))
            .with_state(Arc::clone(&state));

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await;
        });

        Self {
            addr,
            state,
            shutdown: Some(tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/webhook", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for MockWebhook {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn record(
    State(state): State<Arc<HookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let request = RecordedRequest {
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    };

    state.log.push("notify");
    state
        .requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(request);

    state.status
}
