//! Routing and message value types.
//!
//! A [`RoutingTable`] is built once from validated configuration and is never
//! mutated afterwards; the dispatch loop shares it behind an `Arc`.
//! [`IncomingMessage`] and [`OutboundPayload`] live only for the duration of
//! one dispatch iteration.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ApplicationId, DecodeError};

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Body schema expected by a webhook target.
///
/// Chosen explicitly per rule; the relay never guesses from the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// `{"content": "..."}` (Discord-style).
    #[default]
    Content,
    /// `{"title": "...", "content": "..."}`.
    TitleContent,
}

/// Where and how a matched message is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    /// Absolute `http`/`https` endpoint.
    pub url: String,
    /// Extra request headers, applied after `Content-Type`.
    pub headers: BTreeMap<String, String>,
}

impl WebhookTarget {
    /// The endpoint's host, for logs. Webhook URLs carry their secret in the
    /// path, so the full URL is never logged.
    pub fn host(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "<invalid url>".to_string())
    }
}

/// A configured mapping from a gotify application to a webhook target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRule {
    pub application_id: ApplicationId,
    /// Informational only; used in logs.
    pub display_name: String,
    pub target: WebhookTarget,
    pub format: PayloadFormat,
}

/// Ordered, immutable sequence of routing rules.
///
/// Application ids are not unique: several rules may match one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    rules: Vec<RoutingRule>,
}

impl RoutingTable {
    pub fn new(rules: Vec<RoutingRule>) -> Self {
        Self { rules }
    }

    /// Rules whose application id equals `application_id`, in table order.
    pub fn matching(&self, application_id: ApplicationId) -> impl Iterator<Item = &RoutingRule> {
        self.rules
            .iter()
            .filter(move |rule| rule.application_id == application_id)
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A gotify message decoded from one stream frame.
///
/// Only `appid` and `message` are required; everything else gotify sends is
/// either optional here or ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IncomingMessage {
    #[serde(rename = "appid")]
    pub application_id: ApplicationId,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "message")]
    pub body: String,
    /// Server-assigned message id.
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl IncomingMessage {
    /// Decodes a raw stream frame.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(frame)?)
    }
}

/// Body posted to a webhook target. Built fresh for every delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
}

impl OutboundPayload {
    /// Shapes `message` according to the target's `format`.
    pub fn build(format: PayloadFormat, message: &IncomingMessage) -> Self {
        let title = match format {
            PayloadFormat::Content => None,
            PayloadFormat::TitleContent => Some(message.title.clone()),
        };
        Self {
            title,
            content: message.body.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(app: u64, url: &str) -> RoutingRule {
        RoutingRule {
            application_id: ApplicationId::new(app),
            display_name: String::new(),
            target: WebhookTarget {
                url: url.to_string(),
                headers: BTreeMap::new(),
            },
            format: PayloadFormat::Content,
        }
    }

    #[test]
    fn matching_preserves_table_order_and_allows_duplicates() {
        let table = RoutingTable::new(vec![
            rule(5, "https://hook/a"),
            rule(9, "https://hook/c"),
            rule(5, "https://hook/b"),
        ]);

        let urls: Vec<_> = table
            .matching(ApplicationId::new(5))
            .map(|r| r.target.url.as_str())
            .collect();
        assert_eq!(urls, ["https://hook/a", "https://hook/b"]);
        assert_eq!(table.matching(ApplicationId::new(42)).count(), 0);
    }

    #[test]
    fn target_host_drops_the_secret_path() {
        let target = WebhookTarget {
            url: "https://discord.com/api/webhooks/123/s3cr3t".to_string(),
            headers: BTreeMap::new(),
        };
        assert_eq!(target.host(), "discord.com");
    }

    #[test]
    fn decode_full_gotify_frame() {
        let frame = br#"{"id":25,"appid":5,"message":"hi","title":"T","priority":2,
            "date":"2018-02-27T19:36:10.5045044+01:00","extras":{"client::display":{}}}"#;

        let msg = IncomingMessage::decode(frame).unwrap();
        assert_eq!(msg.application_id, ApplicationId::new(5));
        assert_eq!(msg.title, "T");
        assert_eq!(msg.body, "hi");
        assert_eq!(msg.id, Some(25));
        assert_eq!(msg.priority, Some(2));
        assert!(msg.date.is_some());
    }

    #[test]
    fn decode_defaults_missing_title() {
        let msg = IncomingMessage::decode(br#"{"appid":1,"message":"body"}"#).unwrap();
        assert_eq!(msg.title, "");
        assert_eq!(msg.priority, None);
    }

    #[test]
    fn decode_rejects_malformed_frames() {
        assert!(IncomingMessage::decode(b"not json").is_err());
        assert!(IncomingMessage::decode(br#"{"message":"no app"}"#).is_err());
        assert!(IncomingMessage::decode(br#"{"appid":"five","message":"x"}"#).is_err());
    }

    #[test]
    fn payload_shapes() {
        let msg = IncomingMessage::decode(br#"{"appid":5,"message":"hi","title":"T"}"#).unwrap();

        let minimal = serde_json::to_value(OutboundPayload::build(PayloadFormat::Content, &msg))
            .unwrap();
        assert_eq!(minimal, serde_json::json!({ "content": "hi" }));

        let extended =
            serde_json::to_value(OutboundPayload::build(PayloadFormat::TitleContent, &msg))
                .unwrap();
        assert_eq!(extended, serde_json::json!({ "title": "T", "content": "hi" }));
    }
}
