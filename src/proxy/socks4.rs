//! SOCKS4 client handshake

use super::consts::*;
use crate::error::{ProxyError, RelayError, Result};
use bytes::{BufMut, BytesMut};
use std::net::{IpAddr, Ipv4Addr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Resolve `host` locally to its first IPv4 address
///
/// With `numeric` set only IPv4 literals are accepted.
async fn resolve_ipv4(host: &str, port: u16, numeric: bool) -> Result<Ipv4Addr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => Ok(v4),
            IpAddr::V6(_) => Err(ProxyError::Socks4NeedsIpv4(host.to_string()).into()),
        };
    }
    if numeric {
        return Err(RelayError::Resolve {
            host: host.to_string(),
            reason: "non-numeric host with numeric-only resolution".to_string(),
        });
    }

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| RelayError::Resolve {
            host: host.to_string(),
            reason: e.to_string(),
        })?;
    addrs
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| ProxyError::Socks4NeedsIpv4(host.to_string()).into())
}

/// Perform a SOCKS4 CONNECT
///
/// # Protocol
///
/// ```text
/// +----+----+----+----+----+----+----+----+----+----+....+----+
/// | VN | CD | DSTPORT |      DSTIP        | USERID       |NULL|
/// +----+----+----+----+----+----+----+----+----+----+....+----+
///    1    1      2              4           variable       1
/// ```
///
/// The 8-byte reply must carry `0x5A` in its second byte. The first byte
/// should be zero, but some servers echo the request version there.
pub async fn socks4_connect<S>(
    stream: &mut S,
    host: &str,
    port: u16,
    user_id: &str,
    numeric: bool,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let ip = resolve_ipv4(host, port, numeric).await?;

    let mut request = BytesMut::with_capacity(9 + user_id.len());
    request.put_u8(SOCKS4_VERSION);
    request.put_u8(SOCKS4_CMD_CONNECT);
    request.put_u16(port);
    request.put_slice(&ip.octets());
    request.put_slice(user_id.as_bytes());
    request.put_u8(0);

    stream.write_all(&request).await.map_err(ProxyError::Io)?;
    stream.flush().await.map_err(ProxyError::Io)?;

    let mut reply = [0u8; SOCKS4_REPLY_LEN];
    stream.read_exact(&mut reply).await.map_err(ProxyError::Io)?;

    if reply[0] != SOCKS4_REPLY_VERSION {
        tracing::debug!("SOCKS4 reply version is {}, expected 0", reply[0]);
    }
    if reply[1] != SOCKS4_REPLY_GRANTED {
        return Err(ProxyError::Socks4Rejected(reply[1]).into());
    }

    tracing::debug!("SOCKS4 tunnel to {}:{} granted", ip, port);
    Ok(())
}
