//! Configuration management for PeerChain

use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// URL peers use to reach this node. Derived from host and port if unset.
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default = "default_peer_timeout_ms")]
    pub peer_timeout_ms: u64,
    /// Seconds between background consensus rounds; 0 disables them.
    #[serde(default)]
    pub consensus_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MinerConfig {
    /// Reward recipient. Empty means the generated node address.
    #[serde(default)]
    pub reward_address: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
            bootstrap_peers: Vec::new(),
            peer_timeout_ms: default_peer_timeout_ms(),
            consensus_interval_secs: 0,
        }
    }
}

impl NetworkConfig {
    /// The URL this node registers itself under.
    pub fn node_url(&self) -> String {
        match &self.public_url {
            Some(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ => {
                let host = match self.host.as_str() {
                    "0.0.0.0" | "::" => "localhost",
                    other => other,
                };
                format!("http://{}:{}", host, self.port)
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    pub fn consensus_interval(&self) -> Option<Duration> {
        (self.consensus_interval_secs > 0).then(|| Duration::from_secs(self.consensus_interval_secs))
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.network.port == 0 {
            return Err(ChainError::ConfigError("network.port must be non-zero".to_string()));
        }

        if self.network.peer_timeout_ms == 0 {
            return Err(ChainError::ConfigError(
                "network.peer_timeout_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: &Path) -> Result<Config, ChainError> {
    let config: Config = if path.exists() {
        let config_str = fs::read_to_string(path)?;
        toml::from_str(&config_str)?
    } else {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_peer_timeout_ms() -> u64 {
    5_000
}
