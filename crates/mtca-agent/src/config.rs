// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Agent daemon configuration.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration failures; all of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read agent config {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("agent config {} is not valid JSON: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("agent config rejected: {0}")]
    Rejected(String),
}

/// One upstream SHDR adapter to connect to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Adapter host.
    pub host: String,

    /// Adapter TCP port (conventionally 7878).
    #[serde(default = "default_adapter_port")]
    pub port: u16,

    /// Device the adapter feeds, by uuid or name.
    pub device: String,

    /// Delay before reconnecting after a drop (seconds)
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,
}

impl AdapterConfig {
    /// Get reconnect interval as Duration.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    /// `host:port` dial string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Agent daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Address to bind to (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// HTTP port to listen on (default: 5000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Sample buffer capacity
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Asset buffer capacity
    #[serde(default = "default_max_assets")]
    pub max_assets: usize,

    /// `sender` attribute in response headers
    #[serde(default = "default_sender")]
    pub sender: String,

    /// MTConnect schema version for namespaces
    #[serde(default = "default_version")]
    pub schema_version: String,

    /// Cap on `current?at=` replay work (buffer entries)
    #[serde(default = "default_replay_cap")]
    pub replay_cap: usize,

    /// Path to the MTConnect devices document
    #[serde(default = "default_devices_file")]
    pub devices_file: String,

    /// Upstream adapters
    #[serde(default)]
    pub adapters: Vec<AdapterConfig>,
}

fn default_bind_address() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    5000
}

fn default_buffer_size() -> usize {
    131_072
}

fn default_max_assets() -> usize {
    1024
}

fn default_sender() -> String {
    "mtca-agent".to_string()
}

fn default_version() -> String {
    "1.3".to_string()
}

fn default_replay_cap() -> usize {
    131_072
}

fn default_devices_file() -> String {
    "devices.xml".to_string()
}

fn default_adapter_port() -> u16 {
    7878
}

fn default_reconnect_interval() -> u64 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            buffer_size: default_buffer_size(),
            max_assets: default_max_assets(),
            sender: default_sender(),
            schema_version: default_version(),
            replay_cap: default_replay_cap(),
            devices_file: default_devices_file(),
            adapters: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject configurations the agent cannot serve.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Rejected("HTTP port cannot be 0".into()));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::Rejected(
                "sample buffer needs room for at least one observation".into(),
            ));
        }
        if self.max_assets == 0 {
            return Err(ConfigError::Rejected(
                "asset buffer needs room for at least one asset".into(),
            ));
        }
        if self.devices_file.is_empty() {
            return Err(ConfigError::Rejected(
                "no MTConnect devices document configured".into(),
            ));
        }
        for adapter in &self.adapters {
            if adapter.device.is_empty() {
                return Err(ConfigError::Rejected(format!(
                    "SHDR adapter {} names no device",
                    adapter.address()
                )));
            }
            if adapter.host.is_empty() {
                return Err(ConfigError::Rejected(format!(
                    "SHDR adapter for device \"{}\" has no host",
                    adapter.device
                )));
            }
            if adapter.port == 0 {
                return Err(ConfigError::Rejected(format!(
                    "SHDR adapter for device \"{}\" has port 0",
                    adapter.device
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.buffer_size, 131_072);
        assert_eq!(config.max_assets, 1024);
        assert!(config.adapters.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AgentConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AgentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.port, parsed.port);
        assert_eq!(config.buffer_size, parsed.buffer_size);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AgentConfig =
            serde_json::from_str(r#"{"port": 5001, "adapters": [{"host": "mill", "device": "000"}]}"#)
                .unwrap();
        assert_eq!(parsed.port, 5001);
        assert_eq!(parsed.buffer_size, 131_072);
        assert_eq!(parsed.adapters.len(), 1);
        assert_eq!(parsed.adapters[0].port, 7878);
        assert_eq!(parsed.adapters[0].reconnect_interval_secs, 10);
    }

    #[test]
    fn test_validation_port_zero() {
        let config = AgentConfig {
            port: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_adapter_without_device() {
        let config = AgentConfig {
            adapters: vec![AdapterConfig {
                host: "mill".to_string(),
                port: 7878,
                device: String::new(),
                reconnect_interval_secs: 10,
            }],
            ..Default::default()
        };
        let err = config.validate().expect_err("adapter without device");
        assert!(err.to_string().contains("mill:7878"));
        assert!(err.to_string().contains("names no device"));
    }

    #[test]
    fn test_adapter_address_and_interval() {
        let adapter = AdapterConfig {
            host: "10.0.0.7".to_string(),
            port: 7878,
            device: "000".to_string(),
            reconnect_interval_secs: 3,
        };
        assert_eq!(adapter.address(), "10.0.0.7:7878");
        assert_eq!(adapter.reconnect_interval(), Duration::from_secs(3));
    }
}
