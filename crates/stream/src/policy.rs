//! Bounded linear reconnect policy.

use std::future::Future;
use std::time::Duration;

use relay::{ConnectionError, StreamEndpoint};
use tracing::warn;

/// How often and how patiently to dial the stream endpoint.
///
/// After failed attempt `n` (1-based) the connector waits `n × delay_unit`.
/// No jitter, no exponential growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay_unit: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_unit: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy {
    /// Delay following failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.delay_unit * attempt
    }
}

/// Calls `attempt` until it succeeds or `policy.max_attempts` calls have
/// failed, sleeping per the policy after each failure.
///
/// `endpoint` is used only for logging and the returned error; it is
/// displayed with the token redacted.
pub async fn connect_with_retry<T, E, F, Fut>(
    policy: &ReconnectPolicy,
    endpoint: &StreamEndpoint,
    mut attempt: F,
) -> Result<T, ConnectionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut last_error = String::from("no connection attempt was made");

    for n in 1..=policy.max_attempts {
        match attempt().await {
            Ok(connection) => return Ok(connection),
            Err(e) => {
                let delay = policy.delay_after(n);
                warn!(
                    endpoint = %endpoint,
                    attempt = n,
                    max_attempts = policy.max_attempts,
                    delay_secs = delay.as_secs_f64(),
                    error = %e,
                    "unable to connect to gotify stream"
                );
                last_error = e.to_string();
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(ConnectionError::Exhausted {
        endpoint: endpoint.to_string(),
        attempts: policy.max_attempts,
        last_error,
    })
}
