//! Transport module for Relaycat
//!
//! This module turns a destination into an open [`Connection`]: address
//! resolution, port list expansion, outbound connects, inbound listeners,
//! and the socket tuning hook applied around connect and bind.

mod addr;
mod connect;
mod listen;
mod ports;
pub mod srcroute;

pub use addr::{Candidate, ConnectionTarget, Endpoint};
pub use connect::{connect_candidates, connect_target, ConnectInfo, Connected};
pub use listen::{accept_one, bind_listener, Listener};
pub use ports::PortList;

use crate::config::{Family, SocketOptsConfig, SocketType};
use std::io;
use std::net::Shutdown;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpStream, UdpSocket, UnixStream};

/// When socket options are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunePhase {
    /// Right before connect (or before bind for listeners)
    Before,
    /// Right after a successful connect (or bind)
    After,
}

/// Hook applying platform socket options around connect and bind
pub trait SocketTuner: Send + Sync {
    /// Apply options to `socket`
    fn apply(&self, socket: socket2::SockRef<'_>, family: Family, phase: TunePhase)
        -> io::Result<()>;
}

/// Socket options for configuring connections
#[derive(Debug, Clone, Default)]
pub struct SocketOpts {
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// TCP keepalive timeout
    pub keepalive_secs: Option<u64>,
    /// TCP keepalive interval
    pub keepalive_interval: Option<u64>,
    /// IPv4 type of service
    pub tos: Option<u32>,
    /// Receive buffer size
    pub recv_buffer: Option<usize>,
    /// Send buffer size
    pub send_buffer: Option<usize>,
}

impl SocketOpts {
    /// Create socket options from the configuration file section
    pub fn from_config(config: &SocketOptsConfig) -> Self {
        SocketOpts {
            nodelay: config.nodelay,
            keepalive_secs: config.keepalive_secs,
            keepalive_interval: config.keepalive_interval,
            tos: config.tos,
            recv_buffer: config.recv_buffer,
            send_buffer: config.send_buffer,
        }
    }
}

impl SocketTuner for SocketOpts {
    fn apply(
        &self,
        socket: socket2::SockRef<'_>,
        family: Family,
        _phase: TunePhase,
    ) -> io::Result<()> {
        if let Some(size) = self.recv_buffer {
            socket.set_recv_buffer_size(size)?;
        }
        if let Some(size) = self.send_buffer {
            socket.set_send_buffer_size(size)?;
        }
        if family == Family::Unix {
            return Ok(());
        }
        if let (Some(tos), Family::Ipv4) = (self.tos, family) {
            socket.set_tos(tos)?;
        }
        if socket.r#type()? != socket2::Type::STREAM {
            return Ok(());
        }
        if self.nodelay {
            socket.set_nodelay(true)?;
        }
        if let Some(timeout) = self.keepalive_secs {
            let mut keepalive =
                socket2::TcpKeepalive::new().with_time(Duration::from_secs(timeout));
            if let Some(interval) = self.keepalive_interval {
                keepalive = keepalive.with_interval(Duration::from_secs(interval));
            }
            socket.set_tcp_keepalive(&keepalive)?;
        }
        Ok(())
    }
}

/// An open byte-stream or connected datagram endpoint
#[derive(Debug)]
pub enum Connection {
    /// TCP (or MPTCP) stream
    Tcp(TcpStream),
    /// Unix-domain stream
    Unix(UnixStream),
    /// UDP socket connected to a single peer
    Udp(UdpSocket),
}

impl Connection {
    /// Stream or datagram
    pub fn socket_type(&self) -> SocketType {
        match self {
            Connection::Tcp(_) | Connection::Unix(_) => SocketType::Stream,
            Connection::Udp(_) => SocketType::Datagram,
        }
    }

    /// Printable peer address
    pub fn peer_label(&self) -> String {
        let peer = match self {
            Connection::Tcp(s) => s.peer_addr().map(|a| a.to_string()),
            Connection::Udp(s) => s.peer_addr().map(|a| a.to_string()),
            Connection::Unix(s) => s.peer_addr().map(|a| match a.as_pathname() {
                Some(path) => path.display().to_string(),
                None => "unnamed".to_string(),
            }),
        };
        peer.unwrap_or_else(|_| "unknown".to_string())
    }

    /// Borrow the underlying socket for option handling
    pub fn sock_ref(&self) -> socket2::SockRef<'_> {
        match self {
            Connection::Tcp(s) => socket2::SockRef::from(s),
            Connection::Unix(s) => socket2::SockRef::from(s),
            Connection::Udp(s) => socket2::SockRef::from(s),
        }
    }

    /// Stop receiving; the write half stays usable
    pub fn shutdown_read(&self) -> io::Result<()> {
        match self {
            Connection::Udp(_) => Ok(()),
            _ => self.sock_ref().shutdown(Shutdown::Read),
        }
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Connection::Unix(s) => Pin::new(s).poll_read(cx, buf),
            Connection::Udp(s) => s.poll_recv(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Connection::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Connection::Unix(s) => Pin::new(s).poll_write(cx, buf),
            Connection::Udp(s) => s.poll_send(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(s) => Pin::new(s).poll_flush(cx),
            Connection::Unix(s) => Pin::new(s).poll_flush(cx),
            Connection::Udp(_) => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Connection::Unix(s) => Pin::new(s).poll_shutdown(cx),
            Connection::Udp(_) => Poll::Ready(Ok(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_socket_opts_default_is_noop() {
        let opts = SocketOpts::default();
        assert!(!opts.nodelay);
        assert!(opts.keepalive_secs.is_none());
        assert!(opts.tos.is_none());
    }

    #[test]
    fn test_socket_opts_from_config() {
        let config = SocketOptsConfig {
            nodelay: true,
            keepalive_secs: Some(60),
            keepalive_interval: Some(15),
            tos: Some(0x10),
            recv_buffer: None,
            send_buffer: Some(4096),
        };
        let opts = SocketOpts::from_config(&config);
        assert!(opts.nodelay);
        assert_eq!(opts.keepalive_secs, Some(60));
        assert_eq!(opts.keepalive_interval, Some(15));
        assert_eq!(opts.tos, Some(0x10));
        assert_eq!(opts.send_buffer, Some(4096));
    }

    #[test]
    fn test_socket_opts_apply_to_stream_and_datagram() {
        let opts = SocketOpts {
            nodelay: true,
            keepalive_secs: Some(30),
            keepalive_interval: Some(5),
            tos: None,
            recv_buffer: Some(16384),
            send_buffer: None,
        };
        let tcp = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::STREAM, None).unwrap();
        opts.apply(socket2::SockRef::from(&tcp), Family::Ipv4, TunePhase::Before)
            .unwrap();
        assert!(tcp.nodelay().unwrap());

        // nodelay/keepalive are skipped for datagram sockets
        let udp = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, None).unwrap();
        opts.apply(socket2::SockRef::from(&udp), Family::Ipv4, TunePhase::Before)
            .unwrap();
    }

    #[tokio::test]
    async fn test_connection_tcp_roundtrip_and_half_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let mut conn = Connection::Tcp(client.unwrap());
        let (mut peer, _) = accepted.unwrap();

        assert_eq!(conn.socket_type(), SocketType::Stream);
        assert_eq!(conn.peer_label(), addr.to_string());

        conn.write_all(b"ping").await.unwrap();
        conn.shutdown().await.unwrap();

        let mut buf = Vec::new();
        peer.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"ping");

        // write half closed, read half still works
        peer.write_all(b"pong").await.unwrap();
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn test_connection_udp_connected() {
        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        a.connect(b.local_addr().unwrap()).await.unwrap();
        b.connect(a.local_addr().unwrap()).await.unwrap();

        let mut conn = Connection::Udp(a);
        assert_eq!(conn.socket_type(), SocketType::Datagram);
        conn.write_all(b"datagram").await.unwrap();

        let mut buf = [0u8; 64];
        let n = b.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"datagram");

        b.send(b"reply").await.unwrap();
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"reply");
        assert!(conn.shutdown_read().is_ok());
    }
}
