// Path: crates/client/src/config.rs
//! The channel connection profile.
//!
//! A TOML file describing one channel: its peers and orderers, TLS
//! material, timeouts and stream keepalive. Every duration is a plain
//! seconds field so profiles stay diffable.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use weft_types::error::ConfigError;

/// TLS settings for one endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to the CA certificate (PEM) that signed the server certificate.
    pub ca_cert_path: PathBuf,
    /// Override for the expected server name, when it differs from the
    /// endpoint host.
    #[serde(default)]
    pub domain_override: Option<String>,
    /// Client certificate (PEM) for mutual TLS.
    #[serde(default)]
    pub client_cert_path: Option<PathBuf>,
    /// Client private key (PEM) for mutual TLS.
    #[serde(default)]
    pub client_key_path: Option<PathBuf>,
}

/// One endorsing peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// gRPC endpoint, host:port.
    pub endpoint: String,
    /// The MSP the peer belongs to.
    pub msp_id: String,
    /// Ledger height reported out of band; used as the selection score by
    /// the static discovery provider.
    #[serde(default)]
    pub ledger_height: u64,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// One orderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdererConfig {
    /// gRPC endpoint, host:port.
    pub endpoint: String,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// Per-operation deadlines, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Endorsement attempt deadline.
    #[serde(default = "default_endorse_secs")]
    pub endorse_secs: u64,
    /// Broadcast attempt deadline.
    #[serde(default = "default_commit_secs")]
    pub commit_secs: u64,
    /// Delivery-stream connection setup deadline.
    #[serde(default = "default_event_setup_secs")]
    pub event_setup_secs: u64,
    /// How long a submit waits for commit notifications.
    #[serde(default = "default_commit_wait_secs")]
    pub commit_wait_secs: u64,
}

fn default_endorse_secs() -> u64 {
    30
}
fn default_commit_secs() -> u64 {
    30
}
fn default_event_setup_secs() -> u64 {
    15
}
fn default_commit_wait_secs() -> u64 {
    60
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            endorse_secs: default_endorse_secs(),
            commit_secs: default_commit_secs(),
            event_setup_secs: default_event_setup_secs(),
            commit_wait_secs: default_commit_wait_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn endorse(&self) -> Duration {
        Duration::from_secs(self.endorse_secs)
    }
    pub fn commit(&self) -> Duration {
        Duration::from_secs(self.commit_secs)
    }
    pub fn event_setup(&self) -> Duration {
        Duration::from_secs(self.event_setup_secs)
    }
    pub fn commit_wait(&self) -> Duration {
        Duration::from_secs(self.commit_wait_secs)
    }
}

/// HTTP/2 keepalive for long-lived delivery streams.
///
/// Servers throttle pings that arrive more often than their configured
/// minimum, so the effective interval is clamped to `min_interval_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    /// Ping interval.
    #[serde(default = "default_keepalive_interval_secs")]
    pub interval_secs: u64,
    /// How long to wait for a ping ack before declaring the stream dead.
    #[serde(default = "default_keepalive_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum time between pings accepted by the servers.
    #[serde(default = "default_keepalive_min_interval_secs")]
    pub min_interval_secs: u64,
}

fn default_keepalive_interval_secs() -> u64 {
    360
}
fn default_keepalive_timeout_secs() -> u64 {
    3
}
fn default_keepalive_min_interval_secs() -> u64 {
    300
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_keepalive_interval_secs(),
            timeout_secs: default_keepalive_timeout_secs(),
            min_interval_secs: default_keepalive_min_interval_secs(),
        }
    }
}

impl KeepaliveConfig {
    /// The ping interval, clamped to the server-side minimum.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(self.min_interval_secs))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The full connection profile for one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name.
    pub name: String,
    /// The caller's MSP.
    pub msp_id: String,
    /// Endorsing peers.
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
    /// Orderers.
    #[serde(default)]
    pub orderers: Vec<OrdererConfig>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
}

impl ChannelConfig {
    /// Loads and validates a profile from a TOML file.
    pub fn from_toml_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&text)
    }

    /// Parses and validates a profile from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the semantic invariants of the profile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid("channel name is empty".to_string()));
        }
        if self.msp_id.is_empty() {
            return Err(ConfigError::Invalid("msp_id is empty".to_string()));
        }
        for peer in &self.peers {
            if peer.endpoint.is_empty() {
                return Err(ConfigError::Invalid("peer with empty endpoint".to_string()));
            }
        }
        for orderer in &self.orderers {
            if orderer.endpoint.is_empty() {
                return Err(ConfigError::Invalid(
                    "orderer with empty endpoint".to_string(),
                ));
            }
        }
        Ok(())
    }
}
