//! Gotify relay webhook delivery client.
//!
//! Implements [`relay::WebhookDelivery`] with `reqwest`: one JSON `POST` per
//! delivery, `Content-Type: application/json` plus the rule's own headers,
//! and a fixed per-call timeout that applies regardless of what the caller
//! does.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport and status classification live here.
//! The [`relay`] crate sees only [`relay::WebhookDelivery`] and
//! [`relay::DeliveryError`].
//!
//! ## Status classification
//!
//! Any status of 400 or above is a [`relay::DeliveryError::UnexpectedStatus`],
//! even though the request itself completed. Transport failures (refused,
//! reset, timed out) are [`relay::DeliveryError::Transport`]. The response body
//! is never read.

use std::time::Duration;

use async_trait::async_trait;
use relay::{DeliveryError, OutboundPayload, WebhookDelivery, WebhookTarget};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use tracing::debug;

/// Per-call timeout for webhook requests.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts outbound payloads to webhook endpoints.
#[derive(Debug, Clone)]
pub struct HttpWebhookClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpWebhookClient {
    /// Wraps an existing client; every call is bounded by [`DELIVERY_TIMEOUT`].
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DELIVERY_TIMEOUT,
        }
    }

    /// Overrides the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn headers_for(target: &WebhookTarget) -> Result<HeaderMap, DeliveryError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &target.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| DeliveryError::Encode(format!("invalid header name '{name}': {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| DeliveryError::Encode(format!("invalid value for header '{name}': {e}")))?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}

impl Default for HttpWebhookClient {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl WebhookDelivery for HttpWebhookClient {
    async fn deliver(
        &self,
        target: &WebhookTarget,
        payload: &OutboundPayload,
    ) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(payload).map_err(|e| DeliveryError::Encode(e.to_string()))?;
        let headers = Self::headers_for(target)?;

        let response = self
            .client
            .post(&target.url)
            .timeout(self.timeout)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport {
                host: target.host(),
                message: e.without_url().to_string(),
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(DeliveryError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        debug!(host = %target.host(), status = %status, "webhook accepted payload");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use mockito::Matcher;
    use tokio::net::TcpListener;

    use super::*;

    fn target(url: String, headers: &[(&str, &str)]) -> WebhookTarget {
        WebhookTarget {
            url,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn payload() -> OutboundPayload {
        OutboundPayload {
            title: None,
            content: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn posts_json_with_content_type_and_custom_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .match_header("x-api-key", "k")
            .match_body(Matcher::JsonString(r#"{"content":"hi"}"#.to_string()))
            .with_status(204)
            .create_async()
            .await;

        let client = HttpWebhookClient::default();
        let result = client
            .deliver(
                &target(format!("{}/hook", server.url()), &[("X-Api-Key", "k")]),
                &payload(),
            )
            .await;

        assert_eq!(result, Ok(()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn title_is_sent_for_extended_payloads() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(Matcher::JsonString(
                r#"{"title":"T","content":"hi"}"#.to_string(),
            ))
            .with_status(200)
            .create_async()
            .await;

        let extended = OutboundPayload {
            title: Some("T".to_string()),
            content: "hi".to_string(),
        };
        let result = HttpWebhookClient::default()
            .deliver(&target(format!("{}/hook", server.url()), &[]), &extended)
            .await;

        assert_eq!(result, Ok(()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_is_unexpected_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .create_async()
            .await;

        let result = HttpWebhookClient::default()
            .deliver(&target(format!("{}/hook", server.url()), &[]), &payload())
            .await;

        assert_eq!(result, Err(DeliveryError::UnexpectedStatus { status: 500 }));
    }

    #[tokio::test]
    async fn client_error_is_unexpected_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(404)
            .create_async()
            .await;

        let result = HttpWebhookClient::default()
            .deliver(&target(format!("{}/hook", server.url()), &[]), &payload())
            .await;

        assert_eq!(result, Err(DeliveryError::UnexpectedStatus { status: 404 }));
    }

    #[tokio::test]
    async fn unresponsive_endpoint_times_out_as_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept the connection but never answer.
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let client = HttpWebhookClient::default().with_timeout(Duration::from_millis(100));
        let result = client
            .deliver(&target(format!("http://{addr}/hooks/s3cr3t"), &[]), &payload())
            .await;

        match result {
            Err(err @ DeliveryError::Transport { .. }) => {
                assert!(!err.to_string().contains("s3cr3t"), "{err}");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn default_client_uses_five_second_timeout() {
        assert_eq!(DELIVERY_TIMEOUT, Duration::from_secs(5));
        assert_eq!(HttpWebhookClient::default().timeout, DELIVERY_TIMEOUT);
        assert_eq!(
            HttpWebhookClient::new(reqwest::Client::new()).timeout,
            Duration::from_secs(5)
        );
    }

    #[tokio::test]
    async fn invalid_custom_header_is_rejected_before_sending() {
        let result = HttpWebhookClient::default()
            .deliver(
                &target("http://127.0.0.1:9/hook".to_string(), &[("bad header", "v")]),
                &payload(),
            )
            .await;

        assert!(matches!(result, Err(DeliveryError::Encode(_))));
    }
}
