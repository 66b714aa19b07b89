//! Socket tuning configuration
//!
//! Settings for the socket options applied around connect and bind.

use serde::{Deserialize, Serialize};

/// Socket option settings
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct SocketOptsConfig {
    /// Enable TCP_NODELAY
    #[serde(default)]
    pub nodelay: bool,

    /// TCP keepalive idle time in seconds
    #[serde(default)]
    pub keepalive_secs: Option<u64>,

    /// TCP keepalive probe interval in seconds
    #[serde(default)]
    pub keepalive_interval: Option<u64>,

    /// IPv4 type-of-service byte
    #[serde(default)]
    pub tos: Option<u32>,

    /// SO_RCVBUF size
    #[serde(default)]
    pub recv_buffer: Option<usize>,

    /// SO_SNDBUF size
    #[serde(default)]
    pub send_buffer: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_opts_config_default() {
        let config = SocketOptsConfig::default();
        assert!(!config.nodelay);
        assert!(config.keepalive_secs.is_none());
        assert!(config.tos.is_none());
    }

    #[test]
    fn test_socket_opts_config_partial_toml() {
        let config: SocketOptsConfig = toml::from_str("nodelay = true\ntos = 16\n").unwrap();
        assert!(config.nodelay);
        assert_eq!(config.tos, Some(16));
        assert!(config.recv_buffer.is_none());
    }
}
