//! Health probe configuration

use serde::Deserialize;
use std::net::SocketAddr;

use super::error::ValidationError;

/// Health probe listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// IP address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve the probe at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl HealthConfig {
    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> Result<SocketAddr, ValidationError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|_| ValidationError::InvalidHealthAddress(addr))
    }

    /// Validate health probe configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        self.socket_addr()?;
        Ok(())
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enabled: default_enabled(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9090
}

fn default_enabled() -> bool {
    true
}
