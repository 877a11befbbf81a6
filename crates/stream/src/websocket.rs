//! Websocket transport for the gotify stream.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use relay::{ConnectionError, FrameStream, StreamConnector, StreamEndpoint, StreamError};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::{connect_with_retry, ReconnectPolicy};

/// Upper bound on the close handshake so shutdown never hangs on a dead peer.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Installs the ring crypto provider for `wss://` connects. A provider the
/// host installed first is kept.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Dials the gotify stream over `ws://` or `wss://`.
#[derive(Debug, Clone)]
pub struct WebsocketConnector {
    policy: ReconnectPolicy,
}

impl WebsocketConnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        install_crypto_provider();
        Self { policy }
    }
}

impl Default for WebsocketConnector {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

#[async_trait]
impl StreamConnector for WebsocketConnector {
    async fn connect(
        &self,
        endpoint: &StreamEndpoint,
    ) -> Result<Box<dyn FrameStream>, ConnectionError> {
        let url = endpoint.url();
        let (socket, response) =
            connect_with_retry(&self.policy, endpoint, || connect_async(url.clone())).await?;

        info!(endpoint = %endpoint, status = %response.status(), "connected to websocket");
        Ok(Box::new(WebsocketStream::new(socket)))
    }
}

/// A live gotify stream connection.
pub struct WebsocketStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl WebsocketStream {
    pub fn new(socket: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self {
            socket,
            closed: false,
        }
    }
}

#[async_trait]
impl FrameStream for WebsocketStream {
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>, StreamError>> {
        if self.closed {
            return None;
        }
        loop {
            match self.socket.next().await? {
                Ok(message @ (Message::Text(_) | Message::Binary(_))) => {
                    return Some(Ok(message.into_data().to_vec()));
                }
                Ok(Message::Close(frame)) => {
                    debug!(frame = ?frame, "received close frame");
                    return None;
                }
                // Pings are answered by tungstenite itself.
                Ok(_) => continue,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return None;
                }
                Err(e) => return Some(Err(StreamError::Read(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match tokio::time::timeout(CLOSE_TIMEOUT, self.socket.close(None)).await {
            Ok(Ok(())) => debug!("websocket closed"),
            Ok(Err(e)) => debug!(error = %e, "websocket already closed"),
            Err(_) => debug!("websocket close timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::SinkExt;
    use relay::RelayConfig;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    use super::*;

    fn endpoint_for(host: &str) -> StreamEndpoint {
        RelayConfig::from_json(&format!(
            r#"{{"gotify_host":"{host}","client_token":"tok"}}"#
        ))
        .unwrap()
        .stream_endpoint()
    }

    #[tokio::test]
    async fn reads_data_frames_until_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (uri_tx, uri_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let record_uri = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let _ = uri_tx.send(req.uri().to_string());
                Ok(resp)
            };
            let mut ws = accept_hdr_async(tcp, record_uri).await.unwrap();
            ws.send(Message::text(r#"{"appid":1,"message":"a"}"#.to_string()))
                .await
                .unwrap();
            ws.send(Message::Ping(Vec::new().into())).await.unwrap();
            ws.send(Message::binary(b"b".to_vec())).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let connector = WebsocketConnector::default();
        let mut stream = connector
            .connect(&endpoint_for(&format!("http://{addr}")))
            .await
            .unwrap();

        assert_eq!(uri_rx.await.unwrap(), "/stream?token=tok");
        assert_eq!(
            stream.next_frame().await,
            Some(Ok(br#"{"appid":1,"message":"a"}"#.to_vec()))
        );
        assert_eq!(stream.next_frame().await, Some(Ok(b"b".to_vec())));
        assert_eq!(stream.next_frame().await, None);

        stream.close().await;
        stream.close().await;
        assert_eq!(stream.next_frame().await, None);
    }

    #[tokio::test]
    async fn unreachable_endpoint_exhausts_the_policy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = WebsocketConnector::new(ReconnectPolicy {
            max_attempts: 2,
            delay_unit: Duration::from_millis(10),
        });
        let result = connector
            .connect(&endpoint_for(&format!("http://{addr}")))
            .await;

        match result {
            Err(ConnectionError::Exhausted { attempts, .. }) => assert_eq!(attempts, 2),
            Ok(_) => panic!("connected to a closed port"),
        }
    }

    #[tokio::test]
    async fn failed_tls_handshake_exhausts_the_policy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept TCP, then hang up before any TLS is spoken.
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                drop(tcp);
            }
        });

        let connector = WebsocketConnector::new(ReconnectPolicy {
            max_attempts: 2,
            delay_unit: Duration::from_millis(10),
        });
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            connector.connect(&endpoint_for(&format!("https://{addr}"))),
        )
        .await
        .expect("wss connect did not finish");

        assert!(matches!(
            result,
            Err(ConnectionError::Exhausted { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn malformed_url_fails_through_the_retry_path() {
        let connector = WebsocketConnector::new(ReconnectPolicy {
            max_attempts: 1,
            delay_unit: Duration::from_millis(1),
        });

        let result = connector.connect(&endpoint_for("not a url")).await;

        assert!(matches!(
            result,
            Err(ConnectionError::Exhausted { attempts: 1, .. })
        ));
    }
}
