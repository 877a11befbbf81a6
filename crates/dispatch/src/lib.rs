//! Gotify relay orchestration.
//!
//! Wires the port traits from [`relay`] into a running pipeline:
//!
//! ```text
//! StreamConnector ──► FrameStream ──► reader task ──► mpsc ──► dispatch loop ──► router ──► WebhookDelivery
//! ```
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** This crate sequences calls between the domain
//! logic in [`relay`] and the injected infrastructure. It owns the task and
//! channel topology and the shutdown signal, and contains no routing rules of
//! its own.
//!
//! ## Tasks
//!
//! Each enabled [`Relay`] runs two tasks: one reads frames off the connection
//! ([`reader`]), one runs the [`dispatcher`] loop and performs all decoding
//! and delivery. They share nothing but the frame channel.

pub mod dispatcher;
pub mod instance;
pub mod reader;
pub mod session;

pub use dispatcher::{run_dispatch_loop, SessionEnd};
pub use instance::Relay;
pub use reader::spawn_reader;
pub use session::handle_messages;
