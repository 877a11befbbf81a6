//! Relay configuration schema and validation.
//!
//! The host deserialises a [`RelayConfig`], calls [`RelayConfig::validate`]
//! once, and keeps the resulting [`RoutingTable`]. Validation is the only
//! place configuration can fail; nothing downstream re-checks it.

use std::collections::BTreeMap;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::{
    ApplicationId, ConfigError, PayloadFormat, RoutingRule, RoutingTable, WebhookTarget,
};

/// Path of the gotify websocket stream, relative to the server base URL.
const STREAM_PATH: &str = "/stream";

/// Top-level relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Base URL of the gotify server, e.g. `https://push.example.com`.
    #[serde(default)]
    pub gotify_host: String,
    /// Client token used to authenticate the stream.
    #[serde(default = "empty_secret")]
    pub client_token: SecretString,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

/// One `webhooks` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookConfig {
    pub app_id: u64,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub format: PayloadFormat,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            gotify_host: String::new(),
            client_token: empty_secret(),
            webhooks: Vec::new(),
        }
    }
}

impl RelayConfig {
    /// Parses a JSON configuration document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Checks every field and builds the routing table.
    pub fn validate(&self) -> Result<RoutingTable, ConfigError> {
        if self.gotify_host.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "gotify_host",
            });
        }
        if self.client_token.expose_secret().is_empty() {
            return Err(ConfigError::MissingField {
                field: "client_token",
            });
        }

        let rules = self
            .webhooks
            .iter()
            .enumerate()
            .map(|(index, webhook)| webhook.to_rule(index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RoutingTable::new(rules))
    }

    /// Builds the stream endpoint from the host and token.
    ///
    /// The host's scheme is mapped to its websocket counterpart
    /// (`http` → `ws`, `https` → `wss`). The result is not otherwise checked;
    /// a malformed host fails at connect time.
    pub fn stream_endpoint(&self) -> StreamEndpoint {
        let host = self.gotify_host.trim().trim_end_matches('/');
        let base = if let Some(rest) = host.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = host.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            host.to_string()
        };

        StreamEndpoint {
            base: format!("{base}{STREAM_PATH}"),
            token: self.client_token.clone(),
        }
    }
}

impl WebhookConfig {
    fn to_rule(&self, index: usize) -> Result<RoutingRule, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidWebhook {
            index,
            name: self.name.clone(),
            reason,
        };

        if self.app_id == 0 {
            return Err(invalid("app_id is required".to_string()));
        }
        if self.url.trim().is_empty() {
            return Err(invalid("url is required".to_string()));
        }
        let url = Url::parse(self.url.trim()).map_err(|e| invalid(format!("invalid url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported url scheme '{}'", url.scheme())));
        }

        Ok(RoutingRule {
            application_id: ApplicationId::new(self.app_id),
            display_name: self.name.clone(),
            target: WebhookTarget {
                url: self.url.trim().to_string(),
                headers: self.headers.clone(),
            },
            format: self.format,
        })
    }
}

// ---------------------------------------------------------------------------

/// The gotify stream URL, with the token kept out of `Display`/`Debug`.
#[derive(Clone)]
pub struct StreamEndpoint {
    base: String,
    token: SecretString,
}

impl StreamEndpoint {
    /// Full URL including the token query parameter. Pass only to the connector.
    pub fn url(&self) -> String {
        format!("{}?token={}", self.base, self.token.expose_secret())
    }
}

impl std::fmt::Display for StreamEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}?token=[REDACTED]", self.base)
    }
}

impl std::fmt::Debug for StreamEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StreamEndpoint").field(&self.to_string()).finish()
    }
}
