//! In-memory doubles for the port traits.
//!
//! Available to this crate's tests and, through the `test-support` feature,
//! to other crates' tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;

use crate::{
    ConnectionError, DeliveryError, FrameStream, OutboundPayload, StreamConnector,
    StreamEndpoint, StreamError, WebhookDelivery, WebhookTarget,
};

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// Test-side handle feeding frames into a [`ScriptedStream`].
#[derive(Clone)]
pub struct FrameFeed {
    tx: mpsc::UnboundedSender<Result<Vec<u8>, StreamError>>,
}

impl FrameFeed {
    /// Queues a data frame. Returns `false` once the stream has gone away.
    pub fn frame(&self, data: impl Into<Vec<u8>>) -> bool {
        self.tx.unbounded_send(Ok(data.into())).is_ok()
    }

    /// Queues a read error; the reader stops on it.
    pub fn error(&self, message: &str) -> bool {
        self.tx
            .unbounded_send(Err(StreamError::Read(message.to_string())))
            .is_ok()
    }

    /// Simulates the remote side closing the stream.
    pub fn close(&self) {
        self.tx.close_channel();
    }
}

/// A [`FrameStream`] driven by a [`FrameFeed`].
pub struct ScriptedStream {
    rx: mpsc::UnboundedReceiver<Result<Vec<u8>, StreamError>>,
    closed: Arc<AtomicU32>,
}

impl ScriptedStream {
    pub fn new() -> (Self, FrameFeed) {
        let (tx, rx) = mpsc::unbounded();
        let stream = Self {
            rx,
            closed: Arc::new(AtomicU32::new(0)),
        };
        (stream, FrameFeed { tx })
    }
}

#[async_trait]
impl FrameStream for ScriptedStream {
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>, StreamError>> {
        self.rx.next().await
    }

    async fn close(&mut self) {
        self.rx.close();
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A [`StreamConnector`] that hands out one prepared [`ScriptedStream`], or
/// fails every attempt.
pub struct ScriptedConnector {
    stream: Mutex<Option<ScriptedStream>>,
    fail: bool,
    hang: bool,
    connects: AtomicU32,
    closed: Arc<AtomicU32>,
}

impl ScriptedConnector {
    /// A connector that succeeds once. Returns the feed for the stream.
    pub fn new() -> (Self, FrameFeed) {
        let (stream, feed) = ScriptedStream::new();
        let closed = Arc::clone(&stream.closed);
        let connector = Self {
            stream: Mutex::new(Some(stream)),
            fail: false,
            hang: false,
            connects: AtomicU32::new(0),
            closed,
        };
        (connector, feed)
    }

    /// A connector whose retry budget is always exhausted.
    pub fn unreachable() -> Self {
        Self {
            stream: Mutex::new(None),
            fail: true,
            hang: false,
            connects: AtomicU32::new(0),
            closed: Arc::new(AtomicU32::new(0)),
        }
    }

    /// A connector whose `connect` never resolves, as if retrying forever.
    pub fn hanging() -> Self {
        Self {
            stream: Mutex::new(None),
            fail: false,
            hang: true,
            connects: AtomicU32::new(0),
            closed: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Number of `connect` calls so far.
    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of times the handed-out stream was closed.
    pub fn closes(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamConnector for ScriptedConnector {
    async fn connect(
        &self,
        endpoint: &StreamEndpoint,
    ) -> Result<Box<dyn FrameStream>, ConnectionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        let stream = if self.fail {
            None
        } else {
            self.stream.lock().unwrap_or_else(|p| p.into_inner()).take()
        };
        match stream {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(ConnectionError::Exhausted {
                endpoint: endpoint.to_string(),
                attempts: 3,
                last_error: "connection refused".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// A [`WebhookDelivery`] that records every call and fails configured URLs.
#[derive(Default)]
pub struct RecordingDelivery {
    calls: Mutex<Vec<(String, OutboundPayload)>>,
    failing: HashSet<String>,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes deliveries to `url` fail with a 500 status (after recording them).
    pub fn failing_for(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Every `(url, payload)` delivered so far, in call order.
    pub fn deliveries(&self) -> Vec<(String, OutboundPayload)> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.deliveries().into_iter().map(|(url, _)| url).collect()
    }
}

#[async_trait]
impl WebhookDelivery for RecordingDelivery {
    async fn deliver(
        &self,
        target: &WebhookTarget,
        payload: &OutboundPayload,
    ) -> Result<(), DeliveryError> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((target.url.clone(), payload.clone()));
        if self.failing.contains(&target.url) {
            return Err(DeliveryError::UnexpectedStatus { status: 500 });
        }
        Ok(())
    }
}
