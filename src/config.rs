use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub channel: ChannelConfig,
    pub ab: AbConfig,
    pub abx: AbxConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub url: String,
    pub reconnect_delay_ms: u64, // fixed delay, no backoff growth
    pub connect_timeout_ms: u64, // bounds each TCP connect and handshake
    pub simulate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbConfig {
    pub tick_interval_ms: u64, // elapsed-time display refresh
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbxConfig {
    pub unmute_delay_ms: u64, // settle time after a muted preset switch
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            channel: ChannelConfig::default(),
            ab: AbConfig::default(),
            abx: AbxConfig::default(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            url: ws_url("amp.local"),
            reconnect_delay_ms: 2_000,
            connect_timeout_ms: 1_000,
            simulate: false,
        }
    }
}

impl Default for AbConfig {
    fn default() -> Self {
        AbConfig { tick_interval_ms: 1_000 }
    }
}

impl Default for AbxConfig {
    fn default() -> Self {
        AbxConfig { unmute_delay_ms: 1_000 }
    }
}

impl SystemConfig {
    /// Loads a JSON config file. Missing sections and fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }
}

/// The amplifier serves its control socket at `/ws` on its own host.
pub fn ws_url(host: &str) -> String {
    format!("ws://{}/ws", host)
}
