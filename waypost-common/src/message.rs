//! The inbound message as handed over by a transport.
//!
//! An [`InboundMessage`] is read-only: the envelope (`from`, a single `to`),
//! the header block, and the raw content. The raw content is exposed through
//! [`RawBody`], which wraps a one-shot byte stream. The stream is drained at
//! most once into a single immutable buffer; every later reader gets that same
//! buffer back.

use std::{
    fmt::Debug,
    io::Cursor,
    pin::Pin,
    sync::{Mutex, PoisonError},
};

use bytes::Bytes;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader},
    sync::OnceCell,
};

use crate::error::RawBodyError;

type RawStream = Pin<Box<dyn AsyncRead + Send>>;

/// One-shot raw message content.
pub struct RawBody {
    source: Mutex<Option<RawStream>>,
    buffer: OnceCell<Bytes>,
}

impl RawBody {
    /// Wrap a stream that can be read exactly once.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            source: Mutex::new(Some(Box::pin(reader))),
            buffer: OnceCell::new(),
        }
    }

    /// Drain the underlying stream into memory and return the content.
    ///
    /// The first successful call consumes the stream; subsequent calls return
    /// the same buffer without touching the stream again.
    ///
    /// # Errors
    ///
    /// Returns [`RawBodyError::Io`] if the stream fails while being read, and
    /// [`RawBodyError::Consumed`] for any call after such a failure.
    pub async fn bytes(&self) -> Result<Bytes, RawBodyError> {
        self.buffer
            .get_or_try_init(|| async {
                let mut stream = self.take_source()?;
                let mut content = Vec::new();
                stream.read_to_end(&mut content).await?;
                Ok::<_, RawBodyError>(Bytes::from(content))
            })
            .await
            .cloned()
    }

    /// Whether the content has already been buffered.
    #[must_use]
    pub fn is_buffered(&self) -> bool {
        self.buffer.initialized()
    }

    fn take_source(&self) -> Result<RawStream, RawBodyError> {
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(RawBodyError::Consumed)
    }
}

impl From<Bytes> for RawBody {
    fn from(value: Bytes) -> Self {
        Self::from_reader(Cursor::new(value))
    }
}

impl From<Vec<u8>> for RawBody {
    fn from(value: Vec<u8>) -> Self {
        Self::from(Bytes::from(value))
    }
}

impl Debug for RawBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawBody")
            .field("buffered", &self.buffer.get().map(Bytes::len))
            .finish_non_exhaustive()
    }
}

/// Header block of a message, in arrival order.
///
/// Lookup is case-insensitive and returns the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Read the header block at the start of `raw`.
    ///
    /// Only the headers are looked at. A malformed block yields whatever
    /// could be read before the problem, which may be nothing.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        mailparse::parse_headers(raw).map_or_else(
            |_| Self::default(),
            |(headers, _)| {
                Self(
                    headers
                        .iter()
                        .map(|header| (header.get_key(), header.get_value()))
                        .collect(),
                )
            },
        )
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// A message addressed to exactly one recipient.
#[derive(Debug)]
pub struct InboundMessage {
    from: String,
    to: String,
    headers: Headers,
    raw: RawBody,
}

impl InboundMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        headers: Headers,
        raw: RawBody,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            headers,
            raw,
        }
    }

    /// Build a message from content the transport has already buffered,
    /// taking the headers from the content itself.
    pub fn from_bytes(from: impl Into<String>, to: impl Into<String>, raw: Bytes) -> Self {
        let headers = Headers::parse(&raw);
        Self::new(from, to, headers, RawBody::from(raw))
    }

    /// Build a message from a stream, reading only the header block up front.
    ///
    /// The header block is buffered so the headers can be inspected; the rest
    /// of the stream stays unread until [`RawBody::bytes`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`RawBodyError::Io`] if the header block cannot be read.
    pub async fn from_reader<R>(
        from: impl Into<String>,
        to: impl Into<String>,
        reader: R,
    ) -> Result<Self, RawBodyError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let mut reader = BufReader::new(reader);
        let mut head = Vec::new();
        let mut line = Vec::new();

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            head.extend_from_slice(&line);
            if line == b"\r\n" || line == b"\n" {
                break;
            }
        }

        let headers = Headers::parse(&head);
        let raw = RawBody::from_reader(Cursor::new(head).chain(reader));

        Ok(Self::new(from, to, headers, raw))
    }

    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    #[must_use]
    pub fn to(&self) -> &str {
        &self.to
    }

    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    #[must_use]
    pub const fn raw(&self) -> &RawBody {
        &self.raw
    }
}
