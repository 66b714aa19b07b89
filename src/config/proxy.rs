//! Proxy configuration types
//!
//! Describes the intermediate proxy used to reach the destination.

use crate::error::{RelayError, Result};
use crate::helper::{DEFAULT_HTTP_PROXY_PORT, DEFAULT_SOCKS_PORT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Proxy protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProxyKind {
    /// SOCKS version 4
    Socks4,
    /// SOCKS version 5
    #[default]
    Socks5,
    /// HTTP CONNECT tunnel
    HttpConnect,
}

impl ProxyKind {
    /// Parse the `-X` selector: `4`, `5` or `connect`
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "4" => Ok(ProxyKind::Socks4),
            "5" => Ok(ProxyKind::Socks5),
            s if s.eq_ignore_ascii_case("connect") => Ok(ProxyKind::HttpConnect),
            other => Err(RelayError::config(format!(
                "unsupported proxy protocol: {}",
                other
            ))),
        }
    }

    /// Port used when the proxy spec carries none
    pub fn default_port(self) -> u16 {
        match self {
            ProxyKind::Socks4 | ProxyKind::Socks5 => DEFAULT_SOCKS_PORT,
            ProxyKind::HttpConnect => DEFAULT_HTTP_PROXY_PORT,
        }
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyKind::Socks4 => write!(f, "SOCKS4"),
            ProxyKind::Socks5 => write!(f, "SOCKS5"),
            ProxyKind::HttpConnect => write!(f, "HTTP CONNECT"),
        }
    }
}

/// Username/password for the proxy
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProxyCredentials {
    /// Username (also used as the SOCKS4 user id)
    pub username: String,
    /// Password
    pub password: String,
}

impl ProxyCredentials {
    /// Parse `user:password`
    pub fn parse(s: &str) -> Result<Self> {
        let (username, password) = s
            .split_once(':')
            .ok_or_else(|| RelayError::config("proxy credentials must be user:password"))?;
        if username.is_empty() {
            return Err(RelayError::config("proxy username is empty"));
        }
        Ok(ProxyCredentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// Proxy settings that may be kept in the configuration file
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProxyFileConfig {
    /// Proxy username
    #[serde(default)]
    pub username: Option<String>,

    /// Proxy password
    #[serde(default)]
    pub password: Option<String>,
}

impl ProxyFileConfig {
    /// Credentials if both parts are configured
    pub fn credentials(&self) -> Option<ProxyCredentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(ProxyCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

/// Proxy endpoint and protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Protocol spoken with the proxy
    pub kind: ProxyKind,
    /// Proxy host
    pub host: String,
    /// Proxy port, defaulted per protocol when absent
    pub port: Option<String>,
    /// Optional credentials
    pub credentials: Option<ProxyCredentials>,
}

impl ProxyConfig {
    /// Create a proxy config without credentials
    pub fn new(kind: ProxyKind, host: &str, port: Option<&str>) -> Self {
        ProxyConfig {
            kind,
            host: host.to_string(),
            port: port.map(str::to_string),
            credentials: None,
        }
    }

    /// Parse a `host[:port]` proxy address
    pub fn parse(spec: &str, kind: ProxyKind) -> Result<Self> {
        let (host, port) = match spec.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (spec, None),
        };
        if host.is_empty() {
            return Err(RelayError::config(format!("invalid proxy address: {}", spec)));
        }
        if let Some(port) = port {
            match port.parse::<u16>() {
                Ok(p) if p > 0 => {}
                _ => {
                    return Err(RelayError::config(format!("invalid proxy port: {}", port)));
                }
            }
        }
        Ok(ProxyConfig::new(kind, host, port))
    }

    /// Attach credentials
    pub fn with_credentials(mut self, credentials: Option<ProxyCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Port to dial, falling back to the protocol default
    pub fn port_or_default(&self) -> String {
        self.port
            .clone()
            .unwrap_or_else(|| self.kind.default_port().to_string())
    }
}
