//! Gotify stream infrastructure.
//!
//! Implements [`relay::StreamConnector`] over a websocket
//! (`tokio-tungstenite`, rustls with webpki roots for `wss://`).
//!
//! - [`WebsocketConnector`] — dials the gotify `/stream` endpoint, retrying
//!   per its [`ReconnectPolicy`] before reporting a fatal
//!   [`relay::ConnectionError`].
//! - [`WebsocketStream`] — the live connection; yields text and binary frames
//!   as bytes, absorbs ping/pong, and ends on a close frame.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport, TLS, and websocket framing all live here.
//! The [`relay`] crate sees only [`relay::StreamConnector`] and
//! [`relay::FrameStream`].

pub mod policy;
pub mod websocket;

pub use policy::{connect_with_retry, ReconnectPolicy};
pub use websocket::{install_crypto_provider, WebsocketConnector, WebsocketStream};
