//! Capability traits implemented by infrastructure crates.
//!
//! Each trait has exactly one production implementation (`stream` and
//! `webhook` crates) and one in-memory double ([`crate::testing`]). The relay
//! instance holds them as `Arc<dyn ...>` fields injected at construction.

use async_trait::async_trait;

use crate::{ConnectionError, DeliveryError, OutboundPayload, StreamEndpoint, StreamError, WebhookTarget};

/// Opens live stream connections.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Connects to `endpoint`, retrying according to the implementation's
    /// reconnect policy.
    ///
    /// An `Err` means the retry budget is exhausted and the session must end.
    async fn connect(&self, endpoint: &StreamEndpoint) -> Result<Box<dyn FrameStream>, ConnectionError>;
}

/// One live streaming session.
///
/// Owned by exactly one reader task for its whole lifetime.
#[async_trait]
pub trait FrameStream: Send {
    /// Waits for the next data frame.
    ///
    /// Returns `None` once the remote side has closed the stream. Control
    /// frames are handled internally and never surface here.
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>, StreamError>>;

    /// Closes the connection. Safe to call more than once.
    async fn close(&mut self);
}

/// Posts payloads to webhook endpoints.
#[async_trait]
pub trait WebhookDelivery: Send + Sync {
    /// Delivers `payload` to `target`.
    ///
    /// Implementations enforce their own per-call timeout and classify any
    /// status of 400 or above as [`DeliveryError::UnexpectedStatus`].
    async fn deliver(&self, target: &WebhookTarget, payload: &OutboundPayload) -> Result<(), DeliveryError>;
}
