//! Core relay domain for gotify-relay.
//!
//! This crate contains every domain concept of the notification bridge: the
//! routing table, the decoded gotify message, the outbound webhook payload,
//! the configuration schema, and the error taxonomy. Infrastructure crates
//! implement the port traits defined here; they never add routing rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed (a stream of frames, a way to POST a payload);
//! infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ApplicationId`, `SessionId`) |
//! | [`types`] | Routing and message value types |
//! | [`config`] | Configuration schema, validation, stream endpoint |
//! | [`errors`] | Error taxonomy shared by every crate |
//! | [`ports`] | Capability traits: stream connector, frame stream, webhook delivery |
//! | [`router`] | Matching a message against the routing table and fanning out |

pub mod config;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod router;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{RelayConfig, StreamEndpoint, WebhookConfig};
pub use errors::{ConfigError, ConnectionError, DecodeError, DeliveryError, EnableError, StreamError};
pub use identifiers::{ApplicationId, SessionId};
pub use ports::{FrameStream, StreamConnector, WebhookDelivery};
pub use router::{route, RouteSummary};
pub use types::{
    IncomingMessage, OutboundPayload, PayloadFormat, RoutingRule, RoutingTable, WebhookTarget,
};
