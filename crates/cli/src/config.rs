//! Configuration file loading for the host binary.
//!
//! The file is TOML: the relay's own keys at the top level plus an optional
//! `[restart]` table that only the host reads.
//!
//! ```toml
//! gotify_host = "https://push.example.com"
//! client_token = "C1ientT0ken"
//!
//! [[webhooks]]
//! app_id = 5
//! name = "alerts"
//! url = "https://discord.com/api/webhooks/..."
//!
//! [restart]
//! on_stream_close = true
//! delay_secs = 5
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use relay::RelayConfig;
use secrecy::SecretString;
use serde::Deserialize;

/// Everything the binary reads from its configuration file.
#[derive(Debug, Deserialize)]
pub struct HostConfig {
    #[serde(flatten)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub restart: RestartConfig,
}

/// What the host does when a session ends because the stream closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RestartConfig {
    #[serde(default = "default_on_stream_close")]
    pub on_stream_close: bool,
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
}

fn default_on_stream_close() -> bool {
    true
}

fn default_delay_secs() -> u64 {
    5
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            on_stream_close: default_on_stream_close(),
            delay_secs: default_delay_secs(),
        }
    }
}

impl RestartConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

/// Parses a TOML document. `client_token`, if given, replaces the file's token.
pub fn parse(raw: &str, client_token: Option<String>) -> anyhow::Result<HostConfig> {
    let mut config: HostConfig = toml::from_str(raw).context("invalid configuration file")?;
    if let Some(token) = client_token {
        config.relay.client_token = SecretString::new(token);
    }
    Ok(config)
}

/// Reads and parses the configuration file at `path`.
pub fn load(path: &Path, client_token: Option<String>) -> anyhow::Result<HostConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse(&raw, client_token).with_context(|| format!("failed to load {}", path.display()))
}
