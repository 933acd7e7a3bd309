// Path: crates/client/src/endpoint.rs
//! Lazy gRPC channel construction and pooling.

use dashmap::DashMap;
use std::time::Duration;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity as TlsIdentity};

use weft_types::error::ConfigError;

use crate::config::{KeepaliveConfig, TlsConfig};

/// Builds and caches one lazy channel per endpoint.
///
/// Channels are created with `connect_lazy` so a pool can be assembled
/// before the servers are listening; connection errors surface on the first
/// RPC, where the callers' retry and failover logic handles them.
#[derive(Default)]
pub struct EndpointPool {
    channels: DashMap<String, Channel>,
    keepalive: KeepaliveConfig,
}

impl std::fmt::Debug for EndpointPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointPool")
            .field("endpoints", &self.channels.len())
            .field("keepalive", &self.keepalive)
            .finish_non_exhaustive()
    }
}

impl EndpointPool {
    pub fn new(keepalive: KeepaliveConfig) -> Self {
        Self {
            channels: DashMap::new(),
            keepalive,
        }
    }

    /// Returns the cached channel for `endpoint`, creating it on first use.
    pub fn channel_for(
        &self,
        endpoint: &str,
        tls: Option<&TlsConfig>,
    ) -> Result<Channel, ConfigError> {
        if let Some(channel) = self.channels.get(endpoint) {
            return Ok(channel.clone());
        }
        let channel = build_endpoint(endpoint, tls, &self.keepalive)?.connect_lazy();
        self.channels.insert(endpoint.to_string(), channel.clone());
        Ok(channel)
    }
}

/// Builds a configured `Endpoint` for `addr`.
///
/// Streams ride HTTP/2 keepalive: the ping interval is clamped to the
/// server-side minimum so long-lived delivery streams are not throttled,
/// and pings continue while the stream is idle.
pub fn build_endpoint(
    addr: &str,
    tls: Option<&TlsConfig>,
    keepalive: &KeepaliveConfig,
) -> Result<Endpoint, ConfigError> {
    let scheme = if tls.is_some() { "https" } else { "http" };
    let url = if addr.contains("://") {
        addr.to_string()
    } else {
        format!("{}://{}", scheme, addr)
    };
    let mut endpoint = Endpoint::from_shared(url)
        .map_err(|e| ConfigError::Invalid(format!("bad endpoint {:?}: {}", addr, e)))?
        .http2_keep_alive_interval(keepalive.interval())
        .keep_alive_timeout(keepalive.timeout())
        .keep_alive_while_idle(true)
        .tcp_keepalive(Some(Duration::from_secs(60)));

    if let Some(tls) = tls {
        let ca = std::fs::read(&tls.ca_cert_path).map_err(|e| {
            ConfigError::Io(format!(
                "reading CA cert {:?}: {}",
                tls.ca_cert_path, e
            ))
        })?;
        let mut tls_config = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(ca));
        if let Some(domain) = &tls.domain_override {
            tls_config = tls_config.domain_name(domain.clone());
        }
        // Mutual TLS when a client certificate is configured.
        if let (Some(cert_path), Some(key_path)) = (&tls.client_cert_path, &tls.client_key_path) {
            let cert = std::fs::read(cert_path)
                .map_err(|e| ConfigError::Io(format!("reading client cert: {}", e)))?;
            let key = std::fs::read(key_path)
                .map_err(|e| ConfigError::Io(format!("reading client key: {}", e)))?;
            tls_config = tls_config.identity(TlsIdentity::from_pem(cert, key));
        }
        endpoint = endpoint
            .tls_config(tls_config)
            .map_err(|e| ConfigError::Invalid(format!("TLS config: {}", e)))?;
    }
    Ok(endpoint)
}
