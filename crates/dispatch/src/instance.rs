//! Relay instance lifecycle: configure, enable, disable.
//!
//! A [`Relay`] is the unit a host manages. It holds its collaborators as
//! explicit fields (injected once at construction) and runs at most one
//! session at a time.

use std::sync::Arc;

use relay::{
    ConfigError, ConnectionError, EnableError, RelayConfig, RoutingTable, SessionId,
    StreamConnector, WebhookDelivery,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

use crate::{handle_messages, SessionEnd};

/// A validated configuration together with the routing table built from it.
struct ActiveConfig {
    config: RelayConfig,
    table: Arc<RoutingTable>,
}

struct RunningSession {
    id: SessionId,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<SessionEnd, ConnectionError>>,
}

/// One gotify → webhook relay.
pub struct Relay {
    connector: Arc<dyn StreamConnector>,
    delivery: Arc<dyn WebhookDelivery>,
    active: Option<ActiveConfig>,
    session: Option<RunningSession>,
}

impl Relay {
    pub fn new(connector: Arc<dyn StreamConnector>, delivery: Arc<dyn WebhookDelivery>) -> Self {
        Self {
            connector,
            delivery,
            active: None,
            session: None,
        }
    }

    /// The configuration a fresh instance starts from.
    pub fn default_config(&self) -> RelayConfig {
        RelayConfig::default()
    }

    /// Validates `config` and, if it is usable, makes it the configuration
    /// for the next [`enable`](Self::enable). A running session keeps the
    /// table it started with.
    pub fn validate_and_set_config(&mut self, config: RelayConfig) -> Result<(), ConfigError> {
        let table = config.validate()?;
        self.active = Some(ActiveConfig {
            config,
            table: Arc::new(table),
        });
        Ok(())
    }

    /// Starts a session in the background and returns its id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enable(&mut self) -> Result<SessionId, EnableError> {
        let active = self.active.as_ref().ok_or(EnableError::NotConfigured)?;
        if self.is_enabled() {
            return Err(EnableError::AlreadyEnabled);
        }

        let id = SessionId::new_random();
        let span = info_span!("relay_session", session_id = %id);
        span.in_scope(|| {
            info!(
                gotify_host = %active.config.gotify_host,
                webhooks = active.table.len(),
                "enabling relay"
            );
            for rule in active.table.rules() {
                info!(
                    app_id = %rule.application_id,
                    webhook = %rule.display_name,
                    host = %rule.target.host(),
                    "webhook"
                );
            }
        });

        let shutdown = CancellationToken::new();
        let task = handle_messages(
            active.config.stream_endpoint(),
            Arc::clone(&active.table),
            Arc::clone(&self.connector),
            Arc::clone(&self.delivery),
            shutdown.clone(),
        );
        let handle = tokio::spawn(task.instrument(span));

        self.session = Some(RunningSession {
            id,
            shutdown,
            handle,
        });
        Ok(id)
    }

    /// Broadcasts shutdown to the running session, if any.
    ///
    /// Returns immediately; use [`wait`](Self::wait) to observe the session
    /// ending. In-flight deliveries run to their own timeout.
    pub fn disable(&self) {
        if let Some(session) = &self.session {
            info!(session_id = %session.id, "disabling relay");
            session.shutdown.cancel();
        }
    }

    /// `true` while a session is running.
    pub fn is_enabled(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    /// Waits for the current session to end and returns how it ended.
    ///
    /// Returns `None` if no session was started since the last `wait`.
    /// Cancel safe: dropping the future leaves the session in place.
    pub async fn wait(&mut self) -> Option<Result<SessionEnd, ConnectionError>> {
        let joined = (&mut self.session.as_mut()?.handle).await;
        let session = self.session.take()?;
        match joined {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(session_id = %session.id, error = %e, "relay session task failed");
                Some(Ok(SessionEnd::Aborted))
            }
        }
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.disable();
    }
}
