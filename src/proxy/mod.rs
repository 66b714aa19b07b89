//! Proxy client for Relaycat
//!
//! Runs the SOCKS4, SOCKS5 or HTTP CONNECT handshake over a stream that is
//! already connected to the proxy. On success the same stream carries the
//! tunnelled connection to the destination.

pub mod consts;
mod http;
mod socks4;
mod socks5;

use crate::config::{ProxyConfig, ProxyKind};
use crate::error::{ProxyError, RelayError, Result};
use consts::*;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncRead, AsyncWrite};

pub use http::http_connect;
pub use socks4::socks4_connect;
pub use socks5::socks5_connect;

/// Destination as carried inside a proxy request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    /// IP address with port
    Ip(SocketAddr),
    /// Domain name with port, resolved by the proxy
    Domain(String, u16),
}

impl TargetAddr {
    /// Build a target from a host string and numeric port
    pub fn new(host: &str, port: u16) -> Self {
        match host.parse::<IpAddr>() {
            Ok(ip) => TargetAddr::Ip(SocketAddr::new(ip, port)),
            Err(_) => TargetAddr::Domain(host.to_string(), port),
        }
    }

    /// Port number
    pub fn port(&self) -> u16 {
        match self {
            TargetAddr::Ip(addr) => addr.port(),
            TargetAddr::Domain(_, port) => *port,
        }
    }

    /// Host part as written in an HTTP request line
    pub fn authority(&self) -> String {
        match self {
            TargetAddr::Ip(SocketAddr::V6(addr)) => format!("[{}]:{}", addr.ip(), addr.port()),
            TargetAddr::Ip(addr) => addr.to_string(),
            TargetAddr::Domain(domain, port) => format!("{}:{}", domain, port),
        }
    }

    /// Serialize as a SOCKS5 `ATYP ADDR PORT` block
    pub fn to_socks5_bytes(&self) -> std::result::Result<Vec<u8>, ProxyError> {
        let mut bytes = Vec::new();

        match self {
            TargetAddr::Ip(SocketAddr::V4(addr)) => {
                bytes.push(SOCKS5_ADDR_TYPE_IPV4);
                bytes.extend_from_slice(&addr.ip().octets());
                bytes.extend_from_slice(&addr.port().to_be_bytes());
            }
            TargetAddr::Ip(SocketAddr::V6(addr)) => {
                bytes.push(SOCKS5_ADDR_TYPE_IPV6);
                bytes.extend_from_slice(&addr.ip().octets());
                bytes.extend_from_slice(&addr.port().to_be_bytes());
            }
            TargetAddr::Domain(domain, port) => {
                if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN {
                    return Err(ProxyError::DomainTooLong(domain.clone()));
                }
                bytes.push(SOCKS5_ADDR_TYPE_DOMAIN);
                bytes.push(domain.len() as u8);
                bytes.extend_from_slice(domain.as_bytes());
                bytes.extend_from_slice(&port.to_be_bytes());
            }
        }

        Ok(bytes)
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}

/// Negotiate a tunnel to `host`:`port` through the proxy described by `proxy`
///
/// `numeric` forbids the local name lookup SOCKS4 would otherwise need.
pub async fn negotiate<S>(
    stream: &mut S,
    proxy: &ProxyConfig,
    host: &str,
    port: &str,
    numeric: bool,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let port: u16 = port
        .parse()
        .map_err(|_| RelayError::config(format!("invalid destination port: {}", port)))?;
    let credentials = proxy.credentials.as_ref();

    tracing::debug!(
        "Negotiating {} tunnel to {}:{} via {}",
        proxy.kind,
        host,
        port,
        proxy.host
    );

    match proxy.kind {
        ProxyKind::Socks4 => {
            let user_id = credentials.map(|c| c.username.as_str()).unwrap_or_default();
            socks4_connect(stream, host, port, user_id, numeric).await?
        }
        ProxyKind::Socks5 => socks5_connect(stream, &TargetAddr::new(host, port), credentials).await?,
        ProxyKind::HttpConnect => {
            http_connect(stream, &TargetAddr::new(host, port), credentials).await?
        }
    }
    Ok(())
}
