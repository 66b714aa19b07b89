//! Configuration module for Relaycat
//!
//! This module provides the validated connection parameters and the
//! optional TOML file holding socket tuning and proxy credentials.

mod params;
mod proxy;
mod socket;

pub use params::{Config, ConnectStrategy, Family, LineEnding, Mode, SocketType};
pub use proxy::{ProxyConfig, ProxyCredentials, ProxyFileConfig, ProxyKind};
pub use socket::SocketOptsConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of the optional configuration file
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FileConfig {
    /// Socket tuning settings
    #[serde(default)]
    pub socket: SocketOptsConfig,

    /// Proxy credentials
    #[serde(default)]
    pub proxy: ProxyFileConfig,
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<FileConfig> {
    toml::from_str(content).with_context(|| "Failed to parse configuration")
}
