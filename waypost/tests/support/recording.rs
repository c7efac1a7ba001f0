#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use waypost_archive::{ArchiveError, ArchiveStore, BackupRecord, MemoryArchiveStore};
use waypost_common::message::InboundMessage;
use waypost_forward::{ForwardError, Forwarder};

/// Ordered record of which sink did what
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Forwarder that records each attempt and optionally fails it
#[derive(Debug, Default)]
pub struct RecordingForwarder {
    log: EventLog,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl RecordingForwarder {
    pub fn accepting(log: EventLog) -> Self {
        Self {
            log,
            failure: None,
            delay: None,
        }
    }

    pub fn rejecting(log: EventLog, reason: impl Into<String>) -> Self {
        Self {
            log,
            failure: Some(reason.into()),
            delay: None,
        }
    }

    /// Take `delay` before answering, like a slow relay
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn forward(&self, message: &InboundMessage, target: &str) -> Result<(), ForwardError> {
        // Forwarding reads the content, just as the relay does.
        message.raw().bytes().await?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.log.push(format!("forward:{target}"));

        match &self.failure {
            None => Ok(()),
            Some(reason) => Err(ForwardError::Rejected {
                stage: "RCPT TO",
                code: 550,
                message: reason.clone(),
            }),
        }
    }
}

/// Memory store that takes a while to write and logs when it is done
#[derive(Debug, Clone)]
pub struct RecordingStore {
    pub inner: MemoryArchiveStore,
    log: EventLog,
}

impl RecordingStore {
    pub fn new(log: EventLog) -> Self {
        Self {
            inner: MemoryArchiveStore::new(),
            log,
        }
    }

    /// A store that refuses every write
    pub fn full(log: EventLog) -> Self {
        Self {
            inner: MemoryArchiveStore::with_capacity(0),
            log,
        }
    }
}

#[async_trait]
impl ArchiveStore for RecordingStore {
    async fn put(&self, record: &BackupRecord) -> Result<(), ArchiveError> {
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = self.inner.put(record).await;
        self.log.push(match &result {
            Ok(()) => format!("archive:{}", record.key),
            Err(_) => "archive-failed".to_string(),
        });
        result
    }
}
