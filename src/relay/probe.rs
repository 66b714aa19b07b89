//! Zero-I/O reachability probe

use crate::config::SocketType;
use crate::helper::UDP_PROBE_WRITES;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Write single bytes to a connected datagram socket
///
/// ICMP errors from earlier writes surface on later ones, so only the last
/// write decides. Silence cannot be told apart from a filtering firewall.
pub async fn udp_probe<W>(conn: &mut W) -> bool
where
    W: AsyncWrite + Unpin,
{
    let mut reachable = false;
    for _ in 0..UDP_PROBE_WRITES {
        reachable = matches!(conn.write(b"X").await, Ok(1));
    }
    reachable
}

/// Decide whether a freshly established connection counts as open
///
/// Stream connections are open by virtue of having connected.
pub async fn probe<W>(conn: &mut W, socket_type: SocketType) -> bool
where
    W: AsyncWrite + Unpin,
{
    match socket_type {
        SocketType::Stream => true,
        SocketType::Datagram => udp_probe(conn).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Connection;
    use tokio::net::UdpSocket;

    #[tokio::test]
    async fn test_udp_probe_reaches_listener() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(server.local_addr().unwrap()).await.unwrap();
        let mut conn = Connection::Udp(client);

        assert!(probe(&mut conn, SocketType::Datagram).await);

        let mut buf = [0u8; 4];
        for _ in 0..UDP_PROBE_WRITES {
            let n = server.recv(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"X");
        }
    }

    #[tokio::test]
    async fn test_stream_needs_no_writes() {
        let mut sink: Vec<u8> = Vec::new();
        assert!(probe(&mut sink, SocketType::Stream).await);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_failed_last_write_is_unreachable() {
        let (client, server) = tokio::io::duplex(8);
        drop(server);
        let mut client = client;
        assert!(!udp_probe(&mut client).await);
    }
}
