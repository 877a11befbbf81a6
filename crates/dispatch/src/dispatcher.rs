//! The dispatch loop.
//!
//! Single consumer of the frame channel. Each frame is decoded and routed to
//! completion before the next one is taken, which keeps messages in the order
//! the stream delivered them.

use relay::{route, IncomingMessage, RoutingTable, WebhookDelivery};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest frame prefix included in a decode-failure log line.
const FRAME_PREVIEW_CHARS: usize = 200;

/// Why a relay session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The shutdown signal fired (disable or process signal).
    Shutdown,
    /// The reader stopped: the connection failed or the server closed it.
    StreamClosed,
    /// The session task panicked or was aborted.
    Aborted,
}

/// Consumes `frames` until shutdown or until the channel closes.
///
/// Decode failures are logged and skipped. Delivery failures never reach this
/// loop. Once `shutdown` has fired no further frame is routed; a fan-out that
/// is already in flight runs to completion first.
pub async fn run_dispatch_loop(
    shutdown: &CancellationToken,
    mut frames: mpsc::Receiver<Vec<u8>>,
    table: &RoutingTable,
    delivery: &dyn WebhookDelivery,
) -> SessionEnd {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("relay disabled, closing connection");
                return SessionEnd::Shutdown;
            }
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    info!("message channel closed, ending session");
                    return SessionEnd::StreamClosed;
                };
                dispatch_frame(&frame, table, delivery).await;
            }
        }
    }
}

async fn dispatch_frame(frame: &[u8], table: &RoutingTable, delivery: &dyn WebhookDelivery) {
    let message = match IncomingMessage::decode(frame) {
        Ok(message) => message,
        Err(e) => {
            let preview: String = String::from_utf8_lossy(frame)
                .chars()
                .take(FRAME_PREVIEW_CHARS)
                .collect();
            warn!(error = %e, frame = %preview, "skipping undecodable message");
            return;
        }
    };

    debug!(
        app_id = %message.application_id,
        message_id = ?message.id,
        priority = ?message.priority,
        "received message"
    );

    let summary = route(&message, table, delivery).await;
    if summary.attempted > 0 {
        debug!(
            app_id = %message.application_id,
            attempted = summary.attempted,
            failed = summary.failed,
            "message routed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use relay::testing::RecordingDelivery;
    use relay::{ApplicationId, PayloadFormat, RoutingRule, WebhookTarget};

    use super::*;

    fn table() -> RoutingTable {
        RoutingTable::new(vec![RoutingRule {
            application_id: ApplicationId::new(1),
            display_name: "main".to_string(),
            target: WebhookTarget {
                url: "https://hook/main".to_string(),
                headers: BTreeMap::new(),
            },
            format: PayloadFormat::Content,
        }])
    }

    fn channel_with(frames: &[&str]) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(frames.len().max(1));
        for frame in frames {
            tx.try_send(frame.as_bytes().to_vec()).unwrap();
        }
        rx
    }

    #[tokio::test]
    async fn decode_failure_does_not_stop_the_next_frame() {
        let delivery = RecordingDelivery::new();
        let frames = channel_with(&[
            "{not json",
            r#"{"appid":1,"message":"second"}"#,
        ]);

        let end = run_dispatch_loop(&CancellationToken::new(), frames, &table(), &delivery).await;

        assert_eq!(end, SessionEnd::StreamClosed);
        let deliveries = delivery.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].1.content, "second");
    }

    #[tokio::test]
    async fn messages_are_routed_in_arrival_order() {
        let delivery = RecordingDelivery::new();
        let frames = channel_with(&[
            r#"{"appid":1,"message":"a"}"#,
            r#"{"appid":2,"message":"ignored"}"#,
            r#"{"appid":1,"message":"b"}"#,
            r#"{"appid":1,"message":"c"}"#,
        ]);

        run_dispatch_loop(&CancellationToken::new(), frames, &table(), &delivery).await;

        let contents: Vec<_> = delivery
            .deliveries()
            .into_iter()
            .map(|(_, p)| p.content)
            .collect();
        assert_eq!(contents, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn shutdown_stops_dispatch_of_pending_frames() {
        let delivery = RecordingDelivery::new();
        let frames = channel_with(&[r#"{"appid":1,"message":"late"}"#]);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let end = run_dispatch_loop(&shutdown, frames, &table(), &delivery).await;

        assert_eq!(end, SessionEnd::Shutdown);
        assert!(delivery.deliveries().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_is_absorbed() {
        let delivery = RecordingDelivery::new().failing_for("https://hook/main");
        let frames = channel_with(&[
            r#"{"appid":1,"message":"first"}"#,
            r#"{"appid":1,"message":"second"}"#,
        ]);

        let end = run_dispatch_loop(&CancellationToken::new(), frames, &table(), &delivery).await;

        assert_eq!(end, SessionEnd::StreamClosed);
        assert_eq!(delivery.deliveries().len(), 2);
    }
}
