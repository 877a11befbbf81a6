//! One relay session: connect, read, dispatch, tear down.

use std::sync::Arc;

use relay::{ConnectionError, RoutingTable, StreamConnector, StreamEndpoint, WebhookDelivery};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{run_dispatch_loop, spawn_reader, SessionEnd};

/// Runs a complete session against `endpoint`.
///
/// Returns `Err` only when the connector gives up; that is fatal to the
/// session and left to the host to act on. A shutdown during the connect
/// phase ends the session without connecting. The connection is always
/// closed before this returns.
pub async fn handle_messages(
    endpoint: StreamEndpoint,
    table: Arc<RoutingTable>,
    connector: Arc<dyn StreamConnector>,
    delivery: Arc<dyn WebhookDelivery>,
    shutdown: CancellationToken,
) -> Result<SessionEnd, ConnectionError> {
    let stream = tokio::select! {
        _ = shutdown.cancelled() => {
            info!("relay disabled while connecting");
            return Ok(SessionEnd::Shutdown);
        }
        result = connector.connect(&endpoint) => result?,
    };
    info!(endpoint = %endpoint, "connected to gotify stream");

    let (frames, reader) = spawn_reader(stream);
    let end = run_dispatch_loop(&shutdown, frames, &table, delivery.as_ref()).await;

    // The loop has dropped the receiver, which stops the reader.
    if let Err(e) = reader.await {
        error!(error = %e, "stream reader task failed");
    }

    Ok(end)
}
