//! Proxy protocol constants
//!
//! Wire values for the SOCKS4, SOCKS5 and HTTP CONNECT handshakes.

/// SOCKS4 protocol version
pub const SOCKS4_VERSION: u8 = 0x04;
/// SOCKS4 CONNECT command
pub const SOCKS4_CMD_CONNECT: u8 = 0x01;
/// Version byte the server puts in its reply
pub const SOCKS4_REPLY_VERSION: u8 = 0x00;
/// Request granted
pub const SOCKS4_REPLY_GRANTED: u8 = 0x5A;
/// SOCKS4 reply length
pub const SOCKS4_REPLY_LEN: usize = 8;

/// SOCKS5 protocol version
pub const SOCKS5_VERSION: u8 = 0x05;

/// SOCKS5 authentication sub-negotiation version
pub const SOCKS5_AUTH_VERSION: u8 = 0x01;
/// Sub-negotiation success status
pub const SOCKS5_AUTH_SUCCESS: u8 = 0x00;

// Authentication methods
/// No authentication required
pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;
/// Username/password authentication
pub const SOCKS5_AUTH_METHOD_PASSWORD: u8 = 0x02;
/// No acceptable methods
pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xFF;

/// TCP CONNECT command
pub const SOCKS5_CMD_TCP_CONNECT: u8 = 0x01;

// Address types
/// IPv4 address
pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
/// Domain name
pub const SOCKS5_ADDR_TYPE_DOMAIN: u8 = 0x03;
/// IPv6 address
pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;

/// Reserved byte value (always 0x00)
pub const SOCKS5_RESERVED: u8 = 0x00;

/// Maximum domain name length
pub const MAX_DOMAIN_LEN: usize = 255;
/// Maximum RFC 1929 username or password length
pub const MAX_CREDENTIAL_LEN: usize = 255;

/// Upper bound on a single HTTP response header line
pub const MAX_HTTP_LINE_LEN: usize = 8192;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions() {
        assert_eq!(SOCKS4_VERSION, 4);
        assert_eq!(SOCKS5_VERSION, 5);
    }

    #[test]
    fn test_auth_methods() {
        assert_eq!(SOCKS5_AUTH_METHOD_NONE, 0);
        assert_eq!(SOCKS5_AUTH_METHOD_PASSWORD, 2);
        assert_eq!(SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE, 255);
    }

    #[test]
    fn test_address_types() {
        assert_eq!(SOCKS5_ADDR_TYPE_IPV4, 1);
        assert_eq!(SOCKS5_ADDR_TYPE_DOMAIN, 3);
        assert_eq!(SOCKS5_ADDR_TYPE_IPV6, 4);
    }
}
