//! Error taxonomy for the relay.
//!
//! Only [`ConfigError`] and [`ConnectionError`] cross component boundaries as
//! hard failures. [`DecodeError`] and [`DeliveryError`] are absorbed by the
//! layer that detects them (the dispatch loop and the router respectively) and
//! only ever show up in logs. [`StreamError`] ends a reader task and is
//! likewise logged rather than propagated.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Activation-time errors
// ---------------------------------------------------------------------------

/// The supplied configuration cannot be used to start the relay.
///
/// Produced by [`crate::RelayConfig::validate`]; activation is refused and no
/// connection is attempted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required top-level field is missing or empty.
    #[error("{field} is required")]
    MissingField {
        /// Name of the configuration key, e.g. `"gotify_host"`.
        field: &'static str,
    },

    /// A webhook entry is unusable.
    #[error("webhook #{index} ({name}): {reason}")]
    InvalidWebhook {
        /// Zero-based position of the entry in `webhooks`.
        index: usize,
        /// The entry's display name (may be empty).
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The raw configuration document could not be parsed.
    #[error("unable to parse configuration: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },
}

/// Reasons a relay instance refuses to enable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnableError {
    /// `enable` was called before a configuration was validated and set.
    #[error("relay has no validated configuration")]
    NotConfigured,

    /// A session is already running on this instance.
    #[error("relay is already enabled")]
    AlreadyEnabled,
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

/// The stream endpoint could not be reached within the reconnect budget.
///
/// Fatal to the current relay session. The host is expected to observe it and
/// decide whether to restart the instance.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Every connection attempt failed.
    #[error("unable to connect to {endpoint} after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Redacted endpoint (token hidden).
        endpoint: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error reported by the final attempt.
        last_error: String,
    },
}

/// Reading from a live stream connection failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Transport or protocol failure while waiting for the next frame.
    #[error("read error: {0}")]
    Read(String),
}

// ---------------------------------------------------------------------------
// Per-message errors (absorbed, logged)
// ---------------------------------------------------------------------------

/// A stream frame is not a valid gotify message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not JSON of the expected shape.
    #[error("unable to decode message: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single webhook delivery failed.
///
/// Transport failures and rejected requests surface as the same type so the
/// router can treat them uniformly; the variant keeps them distinguishable in
/// logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The payload could not be serialised.
    #[error("unable to encode payload: {0}")]
    Encode(String),

    /// The request did not complete (connect failure, timeout, reset).
    #[error("request to {host} failed: {message}")]
    Transport {
        /// Target host; the full URL may embed a secret.
        host: String,
        /// Underlying client error.
        message: String,
    },

    /// The webhook endpoint answered with a status of 400 or above.
    #[error("unexpected response status code: {status}")]
    UnexpectedStatus {
        /// HTTP status code returned by the endpoint.
        status: u16,
    },
}
