//! Address resolution
//!
//! Turns a host/port pair or a Unix socket path into the ordered list of
//! concrete candidates the establisher walks through.

use crate::config::{Family, SocketType};
use crate::error::{RelayError, Result};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

/// Concrete address of a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// IPv4 or IPv6 socket address
    Inet(SocketAddr),
    /// Unix-domain socket path
    Unix(PathBuf),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Inet(addr) => write!(f, "{}", addr),
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// One resolved address + family + socket type combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Where to connect or bind
    pub endpoint: Endpoint,
    /// Stream or datagram
    pub socket_type: SocketType,
}

impl Candidate {
    /// Family of this candidate
    pub fn family(&self) -> Family {
        match &self.endpoint {
            Endpoint::Inet(SocketAddr::V4(_)) => Family::Ipv4,
            Endpoint::Inet(SocketAddr::V6(_)) => Family::Ipv6,
            Endpoint::Unix(_) => Family::Unix,
        }
    }

    /// Internet socket address, if any
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match &self.endpoint {
            Endpoint::Inet(addr) => Some(*addr),
            Endpoint::Unix(_) => None,
        }
    }
}

/// A logical target before resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Family restriction
    pub family: Family,
    /// Host name, IP literal, Unix path, or `None` for wildcard/loopback
    pub host: Option<String>,
    /// Numeric port, or empty
    pub service: String,
    /// Stream or datagram
    pub socket_type: SocketType,
}

impl ConnectionTarget {
    /// Create a target for an Internet host
    pub fn new(
        family: Family,
        host: Option<&str>,
        service: Option<&str>,
        socket_type: SocketType,
    ) -> Self {
        ConnectionTarget {
            family,
            host: host.map(str::to_string),
            service: service.unwrap_or_default().to_string(),
            socket_type,
        }
    }

    /// Create a target for a Unix-domain socket path
    pub fn unix(path: &str) -> Self {
        ConnectionTarget {
            family: Family::Unix,
            host: Some(path.to_string()),
            service: String::new(),
            socket_type: SocketType::Stream,
        }
    }

    fn display_host(&self) -> String {
        self.host.clone().unwrap_or_else(|| "*".to_string())
    }

    fn resolve_error(&self, reason: impl Into<String>) -> RelayError {
        RelayError::Resolve {
            host: self.display_host(),
            reason: reason.into(),
        }
    }

    fn port(&self) -> Result<u16> {
        if self.service.is_empty() {
            return Ok(0);
        }
        self.service
            .parse::<u16>()
            .map_err(|_| self.resolve_error(format!("invalid port: {}", self.service)))
    }

    fn family_allows(&self, ip: &IpAddr) -> bool {
        match self.family {
            Family::Ipv4 => ip.is_ipv4(),
            Family::Ipv6 => ip.is_ipv6(),
            Family::Unspecified | Family::Unix => true,
        }
    }

    /// Resolve into concrete candidates
    ///
    /// With `passive` set and no host, yields the wildcard address; an
    /// unspecified family defaults to IPv4 so the bind is unambiguous.
    /// With `numeric` set, only IP literals are accepted.
    pub async fn resolve(&self, numeric: bool, passive: bool) -> Result<Vec<Candidate>> {
        if self.family == Family::Unix {
            let path = self
                .host
                .as_ref()
                .ok_or_else(|| self.resolve_error("missing socket path"))?;
            return Ok(vec![Candidate {
                endpoint: Endpoint::Unix(PathBuf::from(path)),
                socket_type: SocketType::Stream,
            }]);
        }

        let port = self.port()?;

        let host = match &self.host {
            Some(host) => host,
            None => {
                let ip = match (self.family, passive) {
                    (Family::Ipv6, true) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
                    (Family::Ipv6, false) => IpAddr::V6(Ipv6Addr::LOCALHOST),
                    (_, true) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    (_, false) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                };
                return Ok(vec![self.candidate(SocketAddr::new(ip, port))]);
            }
        };

        if let Ok(ip) = host.parse::<IpAddr>() {
            if !self.family_allows(&ip) {
                return Err(self.resolve_error("address family not supported"));
            }
            return Ok(vec![self.candidate(SocketAddr::new(ip, port))]);
        }

        if numeric {
            return Err(self.resolve_error("non-numeric host with numeric-only resolution"));
        }

        let resolved = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|e| self.resolve_error(e.to_string()))?;

        let mut candidates: Vec<Candidate> = Vec::new();
        for addr in resolved {
            if !self.family_allows(&addr.ip()) {
                continue;
            }
            let candidate = self.candidate(addr);
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }

        if candidates.is_empty() {
            return Err(self.resolve_error("no address associated with name"));
        }

        tracing::debug!("Resolved {} to {} candidate(s)", host, candidates.len());
        Ok(candidates)
    }

    fn candidate(&self, addr: SocketAddr) -> Candidate {
        Candidate {
            endpoint: Endpoint::Inet(addr),
            socket_type: self.socket_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(family: Family, host: Option<&str>, service: Option<&str>) -> ConnectionTarget {
        ConnectionTarget::new(family, host, service, SocketType::Stream)
    }

    #[tokio::test]
    async fn test_resolve_ipv4_literal() {
        let candidates = target(Family::Unspecified, Some("127.0.0.1"), Some("8080"))
            .resolve(false, false)
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].socket_addr(),
            Some("127.0.0.1:8080".parse().unwrap())
        );
        assert_eq!(candidates[0].family(), Family::Ipv4);
    }

    #[tokio::test]
    async fn test_resolve_ipv6_literal() {
        let candidates = target(Family::Ipv6, Some("::1"), Some("22"))
            .resolve(true, false)
            .await
            .unwrap();
        assert_eq!(candidates[0].family(), Family::Ipv6);
        assert_eq!(candidates[0].socket_addr().unwrap().port(), 22);
    }

    #[tokio::test]
    async fn test_resolve_family_mismatch() {
        let result = target(Family::Ipv6, Some("127.0.0.1"), Some("80"))
            .resolve(false, false)
            .await;
        assert!(matches!(result, Err(RelayError::Resolve { .. })));
    }

    #[tokio::test]
    async fn test_numeric_rejects_names() {
        let result = target(Family::Unspecified, Some("localhost"), Some("80"))
            .resolve(true, false)
            .await;
        assert!(matches!(result, Err(RelayError::Resolve { .. })));
    }

    #[tokio::test]
    async fn test_passive_wildcard_defaults_to_ipv4() {
        let candidates = target(Family::Unspecified, None, Some("4444"))
            .resolve(false, true)
            .await
            .unwrap();
        assert_eq!(
            candidates[0].socket_addr(),
            Some("0.0.0.0:4444".parse().unwrap())
        );

        let candidates = target(Family::Ipv6, None, Some("4444"))
            .resolve(false, true)
            .await
            .unwrap();
        assert_eq!(candidates[0].socket_addr(), Some("[::]:4444".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_empty_service_is_port_zero() {
        let candidates = target(Family::Ipv4, Some("10.1.2.3"), None)
            .resolve(true, true)
            .await
            .unwrap();
        assert_eq!(candidates[0].socket_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_non_numeric_service_rejected() {
        let result = target(Family::Ipv4, Some("10.1.2.3"), Some("http"))
            .resolve(false, false)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resolve_localhost_filtered_to_ipv4() {
        let candidates = target(Family::Ipv4, Some("localhost"), Some("80"))
            .resolve(false, false)
            .await
            .unwrap();
        assert!(candidates.iter().all(|c| c.family() == Family::Ipv4));
    }

    #[tokio::test]
    async fn test_resolve_unix_path() {
        let candidates = ConnectionTarget::unix("/tmp/relay.sock")
            .resolve(false, false)
            .await
            .unwrap();
        assert_eq!(
            candidates,
            vec![Candidate {
                endpoint: Endpoint::Unix(PathBuf::from("/tmp/relay.sock")),
                socket_type: SocketType::Stream,
            }]
        );
        assert_eq!(candidates[0].family(), Family::Unix);
        assert!(candidates[0].socket_addr().is_none());
    }

    #[test]
    fn test_endpoint_display() {
        let endpoint = Endpoint::Inet("10.0.0.1:53".parse().unwrap());
        assert_eq!(format!("{}", endpoint), "10.0.0.1:53");
        let endpoint = Endpoint::Unix(PathBuf::from("/run/x.sock"));
        assert_eq!(format!("{}", endpoint), "/run/x.sock");
    }
}
