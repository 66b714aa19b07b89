//! Connection parameters
//!
//! The immutable option set handed to the establisher, proxy client and
//! data pump. Built once by the binary and validated before any socket
//! is opened.

use super::{ProxyConfig, SocketOptsConfig};
use crate::error::{RelayError, Result};
use crate::helper::{DEFAULT_CHUNK_SIZE, JUMBO_CHUNK_SIZE};
use crate::transport::srcroute::split_destination;
use std::time::Duration;

/// Whether we dial out or wait for a peer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Connect to a remote endpoint
    #[default]
    Connect,
    /// Listen for one inbound connection at a time
    Listen,
}

/// Address family restriction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Family {
    /// Whatever the resolver returns
    #[default]
    Unspecified,
    /// IPv4 only
    Ipv4,
    /// IPv6 only
    Ipv6,
    /// Unix-domain stream sockets
    Unix,
}

/// Stream or datagram transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SocketType {
    /// TCP (or Unix stream)
    #[default]
    Stream,
    /// UDP
    Datagram,
}

impl SocketType {
    /// Protocol name used in user-facing reports
    pub fn proto_name(self) -> &'static str {
        match self {
            SocketType::Stream => "tcp",
            SocketType::Datagram => "udp",
        }
    }
}

/// Line ending applied to local input before it reaches the network
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineEnding {
    /// Send input untouched
    #[default]
    Lf,
    /// Replace a trailing `\n` with `\r\n`
    Crlf,
}

/// How outbound connections are made
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectStrategy {
    /// Single connect call bounded by the configured timeout
    #[default]
    Classic,
    /// Connect without a deadline, optional multipath transport, local and
    /// peer addresses plus a connection id reported afterwards
    Rich {
        /// Use MPTCP instead of TCP
        multipath: bool,
    },
}

impl ConnectStrategy {
    /// Protocol name for reports
    pub fn proto_name(self, socket_type: SocketType) -> &'static str {
        match self {
            ConnectStrategy::Rich { multipath: true } => "mptcp",
            _ => socket_type.proto_name(),
        }
    }
}

/// Validated relay configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Connect or listen
    pub mode: Mode,
    /// Address family restriction
    pub family: Family,
    /// TCP or UDP
    pub socket_type: SocketType,
    /// Destination host, listen host, or Unix socket path
    pub host: Option<String>,
    /// Port or `lo-hi` range
    pub port: Option<String>,
    /// Raw source-route string when the destination used `@`/`!` syntax
    pub source_route: Option<String>,
    /// Do not perform name lookups
    pub numeric: bool,
    /// Local source address for outbound connections
    pub local_host: Option<String>,
    /// Local source port for outbound connections
    pub local_port: Option<String>,
    /// Idle timeout; `None` waits forever
    pub timeout: Option<Duration>,
    /// Delay before each pump iteration
    pub interval: Option<Duration>,
    /// Accept again after each served connection
    pub keep_listening: bool,
    /// Connect-only probing
    pub zero_io: bool,
    /// Report connection progress
    pub verbose: bool,
    /// Shuffle the port list
    pub random_ports: bool,
    /// Never read local input
    pub no_input: bool,
    /// Refuse TELNET option negotiation
    pub telnet: bool,
    /// Line ending translation for local input
    pub line_ending: LineEnding,
    /// Use the large transfer chunk
    pub jumbo: bool,
    /// Apply socket options after connect/bind instead of before
    pub options_after_connect: bool,
    /// Outbound connect strategy
    pub strategy: ConnectStrategy,
    /// Run the socket event observer during the pump
    pub debug_events: bool,
    /// Optional SOCKS/HTTP proxy
    pub proxy: Option<ProxyConfig>,
    /// Socket tuning settings
    pub socket: SocketOptsConfig,
}

impl Config {
    /// Set the destination, splitting off source-route syntax
    pub fn set_destination(&mut self, raw: &str) {
        if self.family == Family::Unix {
            self.host = Some(raw.to_string());
            self.source_route = None;
            return;
        }
        let (host, route) = split_destination(raw, self.family);
        self.host = Some(host);
        self.source_route = route;
    }

    /// Bytes moved per pump iteration
    pub fn chunk_size(&self) -> usize {
        if self.jumbo {
            JUMBO_CHUNK_SIZE
        } else {
            DEFAULT_CHUNK_SIZE
        }
    }

    /// Protocol name for reports
    pub fn proto_name(&self) -> &'static str {
        self.strategy.proto_name(self.socket_type)
    }

    /// Check the option set for incompatible combinations
    pub fn validate(&self) -> Result<()> {
        let listen = self.mode == Mode::Listen;
        let udp = self.socket_type == SocketType::Datagram;
        let multipath = matches!(self.strategy, ConnectStrategy::Rich { multipath: true });

        if self.family == Family::Unix {
            if udp {
                return Err(RelayError::config("cannot use -u and -U"));
            }
            if multipath {
                return Err(RelayError::config("cannot use -M and -U"));
            }
            if self.host.is_none() {
                return Err(RelayError::config("missing socket path"));
            }
        } else if listen {
            if self.port.is_none() {
                return Err(RelayError::config("missing port with option -l"));
            }
        } else if self.host.is_none() || self.port.is_none() {
            return Err(RelayError::config("missing hostname and port"));
        }

        if self.source_route.is_some() {
            if multipath {
                return Err(RelayError::config(
                    "source routing isn't compatible with -M",
                ));
            }
            if self.strategy != ConnectStrategy::Classic {
                return Err(RelayError::config(
                    "source routing requires the classic connect strategy",
                ));
            }
        }
        if multipath && udp {
            return Err(RelayError::config("cannot use -M and -u"));
        }

        if listen {
            if self.local_host.is_some() {
                return Err(RelayError::config("cannot use -s and -l"));
            }
            if self.local_port.is_some() {
                return Err(RelayError::config("cannot use -p and -l"));
            }
            if self.zero_io {
                return Err(RelayError::config("cannot use -z and -l"));
            }
            if let Some(port) = &self.port {
                if port.contains('-') {
                    return Err(RelayError::config("cannot use -l with multiple ports"));
                }
            }
        } else if self.keep_listening {
            return Err(RelayError::config("must use -l with -k"));
        }

        if self.proxy.is_some() {
            if udp {
                return Err(RelayError::config("no proxy support for UDP mode"));
            }
            if listen {
                return Err(RelayError::config("no proxy support for listen"));
            }
            if self.family == Family::Unix {
                return Err(RelayError::config("no proxy support for unix sockets"));
            }
            if self.family == Family::Ipv6 {
                return Err(RelayError::config("no proxy support for IPv6"));
            }
            if self.local_host.is_some() {
                return Err(RelayError::config(
                    "no proxy support for local source address",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProxyConfig, ProxyKind};

    fn connect_config() -> Config {
        Config {
            host: Some("example.com".to_string()),
            port: Some("80".to_string()),
            ..Default::default()
        }
    }

    fn listen_config() -> Config {
        Config {
            mode: Mode::Listen,
            port: Some("4444".to_string()),
            ..Default::default()
        }
    }

    fn with_proxy(mut config: Config) -> Config {
        config.proxy = Some(ProxyConfig::new(ProxyKind::Socks5, "127.0.0.1", None));
        config
    }

    #[test]
    fn test_plain_configs_validate() {
        assert!(connect_config().validate().is_ok());
        assert!(listen_config().validate().is_ok());
        assert!(with_proxy(connect_config()).validate().is_ok());
    }

    #[test]
    fn test_missing_destination() {
        let config = Config {
            port: Some("80".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RelayError::Config(_))));

        let config = Config {
            mode: Mode::Listen,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_listen_with_port_range_fails() {
        for range in ["1-2", "20-25", "65535-1", "80-80"] {
            let config = Config {
                port: Some(range.to_string()),
                ..listen_config()
            };
            let err = config.validate().unwrap_err();
            assert!(matches!(err, RelayError::Config(_)), "{}", range);
        }
    }

    #[test]
    fn test_listen_conflicts() {
        let config = Config {
            local_host: Some("127.0.0.1".to_string()),
            ..listen_config()
        };
        assert!(config.validate().is_err());

        let config = Config {
            local_port: Some("1234".to_string()),
            ..listen_config()
        };
        assert!(config.validate().is_err());

        let config = Config {
            zero_io: true,
            ..listen_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_keep_listening_requires_listen() {
        let config = Config {
            keep_listening: true,
            ..connect_config()
        };
        assert!(config.validate().is_err());

        let config = Config {
            keep_listening: true,
            ..listen_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_proxy_preconditions() {
        let config = with_proxy(Config {
            socket_type: SocketType::Datagram,
            ..connect_config()
        });
        assert!(config.validate().is_err());

        let config = with_proxy(listen_config());
        assert!(config.validate().is_err());

        let config = with_proxy(Config {
            family: Family::Unix,
            host: Some("/tmp/sock".to_string()),
            port: None,
            ..Default::default()
        });
        assert!(config.validate().is_err());

        let config = with_proxy(Config {
            family: Family::Ipv6,
            ..connect_config()
        });
        assert!(config.validate().is_err());

        let config = with_proxy(Config {
            local_host: Some("10.0.0.1".to_string()),
            ..connect_config()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unix_conflicts() {
        let config = Config {
            family: Family::Unix,
            host: Some("/tmp/sock".to_string()),
            socket_type: SocketType::Datagram,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            family: Family::Unix,
            host: Some("/tmp/sock".to_string()),
            strategy: ConnectStrategy::Rich { multipath: true },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_source_route_needs_classic_connect() {
        let mut config = Config {
            port: Some("80".to_string()),
            strategy: ConnectStrategy::Rich { multipath: false },
            ..Default::default()
        };
        config.set_destination("@10.0.0.1@10.0.0.2");
        assert_eq!(config.host.as_deref(), Some("10.0.0.2"));
        assert!(config.source_route.is_some());
        assert!(config.validate().is_err());

        config.strategy = ConnectStrategy::Classic;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_multipath_udp_rejected() {
        let config = Config {
            socket_type: SocketType::Datagram,
            strategy: ConnectStrategy::Rich { multipath: true },
            ..connect_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chunk_size() {
        let mut config = connect_config();
        assert_eq!(config.chunk_size(), 1024);
        config.jumbo = true;
        assert_eq!(config.chunk_size(), 8192);
    }

    #[test]
    fn test_proto_name() {
        let mut config = connect_config();
        assert_eq!(config.proto_name(), "tcp");
        config.socket_type = SocketType::Datagram;
        assert_eq!(config.proto_name(), "udp");
        config.socket_type = SocketType::Stream;
        config.strategy = ConnectStrategy::Rich { multipath: true };
        assert_eq!(config.proto_name(), "mptcp");
    }
}
