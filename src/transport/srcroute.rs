//! IPv4 source routing
//!
//! Destinations written as `@hop1@hop2@dst` request a loose source route,
//! `!hop1@hop2@dst` a strict one. Hops must be IPv4 literals.

use crate::config::Family;
use std::net::Ipv4Addr;
use std::os::fd::AsRawFd;

const IPOPT_NOP: u8 = 1;
const IPOPT_LSRR: u8 = 131;
const IPOPT_SSRR: u8 = 137;
/// First address slot within the option, counted from 1
const IPOPT_MINOFF: u8 = 4;
/// 40 option bytes minus NOP, code, length and pointer, in 4-byte slots
const MAX_ROUTE_ADDRS: usize = 9;

/// Split a destination into the host to resolve and the raw route string
///
/// Without a leading `@` or `!` the destination is returned unchanged.
pub fn split_destination(raw: &str, family: Family) -> (String, Option<String>) {
    if !(raw.starts_with('@') || raw.starts_with('!')) {
        return (raw.to_string(), None);
    }

    let split_at = if family == Family::Ipv6 {
        raw.rfind('@')
    } else {
        raw.rfind(':').or_else(|| raw.rfind('@'))
    };

    match split_at {
        Some(idx) if idx + 1 < raw.len() => (raw[idx + 1..].to_string(), Some(raw.to_string())),
        _ => (raw.to_string(), None),
    }
}

/// Build the IP option bytes for a route string
pub fn build_route_option(route: &str) -> Result<Vec<u8>, String> {
    let code = if route.starts_with('!') {
        IPOPT_SSRR
    } else {
        IPOPT_LSRR
    };

    let addrs = route
        .split(|c| c == '@' || c == '!' || c == ':')
        .filter(|hop| !hop.is_empty())
        .map(|hop| {
            hop.parse::<Ipv4Addr>()
                .map_err(|_| format!("source route hop is not an IPv4 address: {}", hop))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if addrs.len() < 2 {
        return Err("source route needs at least one hop".to_string());
    }
    if addrs.len() > MAX_ROUTE_ADDRS {
        return Err(format!(
            "source route too long ({} addresses, at most {})",
            addrs.len(),
            MAX_ROUTE_ADDRS
        ));
    }

    let mut option = Vec::with_capacity(4 + addrs.len() * 4);
    option.push(IPOPT_NOP);
    option.push(code);
    option.push((3 + addrs.len() * 4) as u8);
    option.push(IPOPT_MINOFF);
    for addr in &addrs {
        option.extend_from_slice(&addr.octets());
    }
    Ok(option)
}

/// Attach a source route to an IPv4 socket
pub fn apply_source_route(
    socket: &socket2::Socket,
    route: &str,
    family: Family,
) -> Result<(), String> {
    if family != Family::Ipv4 {
        return Err("source routing is only supported for IPv4".to_string());
    }
    let option = build_route_option(route)?;

    // SAFETY: the fd is owned by `socket` for the duration of the call and
    // `option` outlives it; the length passed matches the buffer.
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_IP,
            libc::IP_OPTIONS,
            option.as_ptr() as *const libc::c_void,
            option.len() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(std::io::Error::last_os_error().to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_destination_untouched() {
        assert_eq!(
            split_destination("example.com", Family::Unspecified),
            ("example.com".to_string(), None)
        );
    }

    #[test]
    fn test_loose_route_split() {
        let (host, route) = split_destination("@10.0.0.1@10.0.0.2@10.0.0.3", Family::Ipv4);
        assert_eq!(host, "10.0.0.3");
        assert_eq!(route.as_deref(), Some("@10.0.0.1@10.0.0.2@10.0.0.3"));
    }

    #[test]
    fn test_colon_separates_final_destination() {
        let (host, route) = split_destination("@10.0.0.1@10.0.0.2:example.com", Family::Ipv4);
        assert_eq!(host, "example.com");
        assert!(route.is_some());
    }

    #[test]
    fn test_route_without_separator_is_plain() {
        let (host, route) = split_destination("!onlyhost", Family::Ipv4);
        assert_eq!(host, "!onlyhost");
        assert!(route.is_none());
    }

    #[test]
    fn test_build_loose_option() {
        let option = build_route_option("@10.0.0.1@192.168.1.1").unwrap();
        assert_eq!(
            option,
            vec![IPOPT_NOP, IPOPT_LSRR, 11, 4, 10, 0, 0, 1, 192, 168, 1, 1]
        );
    }

    #[test]
    fn test_build_strict_option() {
        let option = build_route_option("!10.0.0.1@10.0.0.2").unwrap();
        assert_eq!(option[1], IPOPT_SSRR);
    }

    #[test]
    fn test_build_option_errors() {
        assert!(build_route_option("@gateway@10.0.0.2").is_err());
        assert!(build_route_option("@10.0.0.2").is_err());
        let long = (1..=10).map(|i| format!("@10.0.0.{}", i)).collect::<String>();
        assert!(build_route_option(&long).is_err());
    }
}
