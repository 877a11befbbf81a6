//! Host behaviour around a [`Relay`]: process signals and restart policy.

use std::sync::Arc;

use anyhow::Context;
use dispatch::{Relay, SessionEnd};
use stream::WebsocketConnector;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use webhook::HttpWebhookClient;

use crate::config::{HostConfig, RestartConfig};

/// Runs the relay until a process signal arrives or a session fails fatally.
pub async fn run(config: HostConfig) -> anyhow::Result<()> {
    let mut relay = Relay::new(
        Arc::new(WebsocketConnector::default()),
        Arc::new(HttpWebhookClient::default()),
    );
    relay
        .validate_and_set_config(config.relay)
        .context("invalid configuration")?;

    let stop = CancellationToken::new();
    tokio::spawn({
        let stop = stop.clone();
        async move {
            shutdown_signal().await;
            stop.cancel();
        }
    });

    supervise(&mut relay, &stop, config.restart).await
}

/// Enables `relay` and keeps it running per `restart` until `stop` fires.
async fn supervise(
    relay: &mut Relay,
    stop: &CancellationToken,
    restart: RestartConfig,
) -> anyhow::Result<()> {
    loop {
        relay.enable().context("unable to enable relay")?;

        let outcome = tokio::select! {
            outcome = relay.wait() => outcome,
            _ = stop.cancelled() => None,
        };

        if stop.is_cancelled() {
            relay.disable();
            let _ = relay.wait().await;
            info!("relay stopped");
            return Ok(());
        }

        match outcome {
            None | Some(Ok(SessionEnd::Shutdown)) => return Ok(()),
            Some(Ok(end)) => {
                if !restart.on_stream_close {
                    warn!(reason = ?end, "relay session ended, restart disabled");
                    return Ok(());
                }
                warn!(
                    reason = ?end,
                    delay_secs = restart.delay_secs,
                    "relay session ended, restarting"
                );
                tokio::select! {
                    _ = tokio::time::sleep(restart.delay()) => {}
                    _ = stop.cancelled() => {
                        info!("relay stopped");
                        return Ok(());
                    }
                }
            }
            Some(Err(e)) => return Err(e).context("relay session failed"),
        }
    }
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "unable to listen for interrupt");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "unable to listen for terminate");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("received interrupt, closing connection"),
        _ = terminate => info!("received terminate, closing connection"),
    }
}

#[cfg(test)]
mod tests {
    use relay::testing::{RecordingDelivery, ScriptedConnector};
    use relay::RelayConfig;

    use super::*;

    fn relay_with(connector: ScriptedConnector) -> Relay {
        let mut relay = Relay::new(Arc::new(connector), Arc::new(RecordingDelivery::new()));
        relay
            .validate_and_set_config(
                RelayConfig::from_json(r#"{"gotify_host":"https://x","client_token":"tok"}"#)
                    .unwrap(),
            )
            .unwrap();
        relay
    }

    #[tokio::test]
    async fn connection_failure_is_fatal() {
        let mut relay = relay_with(ScriptedConnector::unreachable());

        let result = supervise(&mut relay, &CancellationToken::new(), RestartConfig::default()).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stream_close_without_restart_exits_cleanly() {
        let (connector, feed) = ScriptedConnector::new();
        feed.close();
        let mut relay = relay_with(connector);
        let restart = RestartConfig {
            on_stream_close: false,
            delay_secs: 0,
        };

        let result = supervise(&mut relay, &CancellationToken::new(), restart).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn stop_signal_disables_the_running_session() {
        let (connector, _feed) = ScriptedConnector::new();
        let mut relay = relay_with(connector);
        let stop = CancellationToken::new();
        stop.cancel();

        let result = supervise(&mut relay, &stop, RestartConfig::default()).await;

        assert!(result.is_ok());
        assert!(!relay.is_enabled());
    }
}
