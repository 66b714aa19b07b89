//! Error types for Relaycat
//!
//! This module defines all custom error types used throughout the application.

use std::io;
use thiserror::Error;

/// Main error type for Relaycat operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Incompatible or malformed options, detected before any socket is opened
    #[error("Configuration error: {0}")]
    Config(String),

    /// Name lookup failure
    #[error("Failed to resolve {host}: {reason}")]
    Resolve {
        /// Host (or path) that failed to resolve
        host: String,
        /// Human-readable reason
        reason: String,
    },

    /// Binding an explicitly requested local address failed
    #[error("Bind failed on {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: String,
        /// Underlying socket error
        source: io::Error,
    },

    /// Every candidate address was tried without success
    #[error("Unable to connect to {host} port {port} ({proto}): {reason}")]
    Unreachable {
        /// Destination host
        host: String,
        /// Destination port
        port: String,
        /// "tcp", "udp", "mptcp" or "unix"
        proto: &'static str,
        /// Error seen on the last candidate
        reason: String,
    },

    /// Proxy negotiation failure
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),
}

impl RelayError {
    /// Build a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        RelayError::Config(msg.into())
    }

    /// Whether the scan loop may move on to the next port after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RelayError::Unreachable { .. })
    }
}

/// Proxy handshake errors
#[derive(Error, Debug)]
pub enum ProxyError {
    /// SOCKS4 server did not grant the request
    #[error("SOCKS4 request rejected (code 0x{0:02x})")]
    Socks4Rejected(u8),

    /// SOCKS4 only carries IPv4 destinations
    #[error("SOCKS4 destination must resolve to IPv4: {0}")]
    Socks4NeedsIpv4(String),

    /// Server answered with an unexpected protocol version
    #[error("Unexpected proxy protocol version: {0}")]
    UnexpectedVersion(u8),

    /// No acceptable authentication method
    #[error("No acceptable authentication method")]
    NoAcceptableMethod,

    /// Server picked a method we never offered
    #[error("Proxy selected unsupported authentication method 0x{0:02x}")]
    UnsupportedMethod(u8),

    /// Username/password rejected
    #[error("Proxy authentication failed")]
    AuthFailed,

    /// Credentials are limited to 255 bytes each
    #[error("Proxy credentials too long")]
    CredentialsTooLong,

    /// Domain names in SOCKS5 requests are limited to 255 bytes
    #[error("Destination name too long: {0}")]
    DomainTooLong(String),

    /// SOCKS5 connect reply carried a failure code
    #[error("SOCKS5 connect failed: {0}")]
    Socks5Reply(Socks5ReplyCode),

    /// SOCKS5 reply carried an unknown reply code
    #[error("SOCKS5 connect failed with unknown code 0x{0:02x}")]
    Socks5UnknownReply(u8),

    /// Reply carried an unknown address type
    #[error("Address type not supported: {0}")]
    AddressTypeNotSupported(u8),

    /// HTTP CONNECT answered with a non-2xx status
    #[error("HTTP CONNECT failed: {0}")]
    HttpStatus(String),

    /// Response could not be parsed
    #[error("Malformed proxy response: {0}")]
    Malformed(String),

    /// IO error during negotiation
    #[error("IO error during proxy negotiation: {0}")]
    Io(#[from] io::Error),
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks5ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<Socks5ReplyCode> for u8 {
    fn from(code: Socks5ReplyCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for Socks5ReplyCode {
    type Error = ProxyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Socks5ReplyCode::Succeeded),
            0x01 => Ok(Socks5ReplyCode::GeneralFailure),
            0x02 => Ok(Socks5ReplyCode::ConnectionNotAllowed),
            0x03 => Ok(Socks5ReplyCode::NetworkUnreachable),
            0x04 => Ok(Socks5ReplyCode::HostUnreachable),
            0x05 => Ok(Socks5ReplyCode::ConnectionRefused),
            0x06 => Ok(Socks5ReplyCode::TtlExpired),
            0x07 => Ok(Socks5ReplyCode::CommandNotSupported),
            0x08 => Ok(Socks5ReplyCode::AddressTypeNotSupported),
            other => Err(ProxyError::Socks5UnknownReply(other)),
        }
    }
}

impl std::fmt::Display for Socks5ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Socks5ReplyCode::Succeeded => "succeeded",
            Socks5ReplyCode::GeneralFailure => "general SOCKS server failure",
            Socks5ReplyCode::ConnectionNotAllowed => "connection not allowed by ruleset",
            Socks5ReplyCode::NetworkUnreachable => "network unreachable",
            Socks5ReplyCode::HostUnreachable => "host unreachable",
            Socks5ReplyCode::ConnectionRefused => "connection refused",
            Socks5ReplyCode::TtlExpired => "TTL expired",
            Socks5ReplyCode::CommandNotSupported => "command not supported",
            Socks5ReplyCode::AddressTypeNotSupported => "address type not supported",
        };
        f.write_str(text)
    }
}

/// Result alias used by the library
pub type Result<T, E = RelayError> = std::result::Result<T, E>;
