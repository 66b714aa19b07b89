//! Outbound connection establishment
//!
//! Walks the resolved candidates in order and returns the first one that
//! connects. Per-candidate failures are recorded and skipped; only an
//! explicitly requested local bind is fatal.

use super::srcroute::apply_source_route;
use super::{Candidate, Connection, ConnectionTarget, SocketTuner, TunePhase};
use crate::config::{Config, ConnectStrategy, Family, SocketType};
use crate::error::{RelayError, Result};
use crate::helper::maybe_timeout;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::{TcpSocket, UdpSocket, UnixStream};
use tracing::{debug, info, warn};


static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Details reported by the rich connect strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectInfo {
    /// Process-unique connection identifier
    pub id: u64,
    /// Local address chosen by the kernel
    pub local: Option<SocketAddr>,
    /// Remote address
    pub peer: Option<SocketAddr>,
    /// Whether the socket was opened as multipath
    pub multipath: bool,
}

/// A successfully established outbound connection
#[derive(Debug)]
pub struct Connected {
    /// The open connection
    pub conn: Connection,
    /// Candidate that accepted the connection
    pub candidate: Candidate,
    /// Present when the rich strategy was used
    pub info: Option<ConnectInfo>,
}

/// Resolve `host`/`port` and connect to the first reachable candidate
///
/// For Unix-domain mode `host` is the socket path and `port` is ignored.
pub async fn connect_target(
    config: &Config,
    host: &str,
    port: &str,
    tuner: &dyn SocketTuner,
) -> Result<Connected> {
    if config.family == Family::Unix {
        return connect_unix(host).await;
    }

    let target = ConnectionTarget::new(config.family, Some(host), Some(port), config.socket_type);
    let candidates = target.resolve(config.numeric, false).await?;
    connect_candidates(config, host, port, &candidates, tuner).await
}

async fn connect_unix(path: &str) -> Result<Connected> {
    match UnixStream::connect(Path::new(path)).await {
        Ok(stream) => Ok(Connected {
            conn: Connection::Unix(stream),
            candidate: Candidate {
                endpoint: super::Endpoint::Unix(path.into()),
                socket_type: SocketType::Stream,
            },
            info: None,
        }),
        Err(e) => Err(RelayError::Unreachable {
            host: path.to_string(),
            port: String::new(),
            proto: "unix",
            reason: e.to_string(),
        }),
    }
}

/// Try each candidate in order
pub async fn connect_candidates(
    config: &Config,
    host: &str,
    port: &str,
    candidates: &[Candidate],
    tuner: &dyn SocketTuner,
) -> Result<Connected> {
    let proto = config.proto_name();
    let mut failures: Vec<(SocketAddr, io::Error)> = Vec::new();

    for candidate in candidates {
        let Some(addr) = candidate.socket_addr() else {
            continue;
        };
        let family = candidate.family();

        let socket = match open_socket(addr, candidate.socket_type, config.strategy) {
            Ok(socket) => socket,
            Err(e) => {
                debug!("socket for {} failed: {}", addr, e);
                failures.push((addr, e));
                continue;
            }
        };

        let source = source_address(config, candidate).await?;
        if let Some(source) = source {
            bind_source(&socket, source)?;
        }

        if let (ConnectStrategy::Classic, Some(route)) = (config.strategy, &config.source_route) {
            if let Err(reason) = apply_source_route(&socket, route, family) {
                warn!("bad source route option: {}: {}", route, reason);
            }
        }

        if !config.options_after_connect {
            tuner.apply(socket2::SockRef::from(&socket), family, TunePhase::Before)?;
        }

        let attempt = match config.strategy {
            ConnectStrategy::Classic => {
                classic_connect(socket, addr, candidate.socket_type, config.timeout)
                    .await
                    .map(|conn| (conn, None))
            }
            ConnectStrategy::Rich { multipath } => {
                rich_connect(socket, addr, candidate.socket_type, multipath).await
            }
        };

        match attempt {
            Ok((conn, info)) => {
                if config.options_after_connect {
                    tuner.apply(conn.sock_ref(), family, TunePhase::After)?;
                }
                if let (Some(info), true) = (&info, config.verbose) {
                    info!(
                        "connection {}: {} -> {} ({})",
                        info.id,
                        info.local.map(|a| a.to_string()).unwrap_or_default(),
                        info.peer.map(|a| a.to_string()).unwrap_or_default(),
                        if info.multipath { "mptcp" } else { proto },
                    );
                }
                return Ok(Connected {
                    conn,
                    candidate: candidate.clone(),
                    info,
                });
            }
            Err(e) => {
                if config.verbose {
                    warn!("connect to {} port {} ({}) failed: {}", host, port, proto, e);
                } else {
                    debug!("connect to {} failed: {}", addr, e);
                }
                failures.push((addr, e));
            }
        }
    }

    let reason = failures
        .last()
        .map(|(_, e)| e.to_string())
        .unwrap_or_else(|| "no usable address".to_string());
    debug!(
        "all {} candidate(s) for {} port {} failed",
        failures.len(),
        host,
        port
    );
    Err(RelayError::Unreachable {
        host: host.to_string(),
        port: port.to_string(),
        proto,
        reason,
    })
}

fn open_socket(
    addr: SocketAddr,
    socket_type: SocketType,
    strategy: ConnectStrategy,
) -> io::Result<Socket> {
    let (ty, protocol) = match (socket_type, strategy) {
        (SocketType::Datagram, _) => (Type::DGRAM, Protocol::UDP),
        (SocketType::Stream, ConnectStrategy::Rich { multipath: true }) => {
            (Type::STREAM, Protocol::from(libc::IPPROTO_MPTCP))
        }
        (SocketType::Stream, _) => (Type::STREAM, Protocol::TCP),
    };
    let socket = Socket::new(Domain::for_address(addr), ty, Some(protocol))?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Resolve the requested local address for the candidate's family
async fn source_address(config: &Config, candidate: &Candidate) -> Result<Option<SocketAddr>> {
    if config.local_host.is_none() && config.local_port.is_none() {
        return Ok(None);
    }
    let target = ConnectionTarget::new(
        candidate.family(),
        config.local_host.as_deref(),
        config.local_port.as_deref(),
        candidate.socket_type,
    );
    let local = target.resolve(config.numeric, true).await?;
    Ok(local.first().and_then(Candidate::socket_addr))
}

fn bind_source(socket: &Socket, source: SocketAddr) -> Result<()> {
    socket
        .bind(&source.into())
        .map_err(|e| RelayError::Bind {
            addr: source.to_string(),
            source: e,
        })
}

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "connection timed out")
}

async fn classic_connect(
    socket: Socket,
    addr: SocketAddr,
    socket_type: SocketType,
    timeout: Option<Duration>,
) -> io::Result<Connection> {
    match socket_type {
        SocketType::Stream => {
            let socket = TcpSocket::from_std_stream(socket.into());
            match maybe_timeout(timeout, socket.connect(addr)).await {
                Some(stream) => Ok(Connection::Tcp(stream?)),
                None => Err(timed_out()),
            }
        }
        SocketType::Datagram => {
            let socket = UdpSocket::from_std(socket.into())?;
            socket.connect(addr).await?;
            Ok(Connection::Udp(socket))
        }
    }
}

/// Connect without a deadline and report the kernel-chosen endpoints
async fn rich_connect(
    socket: Socket,
    addr: SocketAddr,
    socket_type: SocketType,
    multipath: bool,
) -> io::Result<(Connection, Option<ConnectInfo>)> {
    let conn = match socket_type {
        SocketType::Stream => {
            let socket = TcpSocket::from_std_stream(socket.into());
            Connection::Tcp(socket.connect(addr).await?)
        }
        SocketType::Datagram => {
            let socket = UdpSocket::from_std(socket.into())?;
            socket.connect(addr).await?;
            Connection::Udp(socket)
        }
    };

    let sock = conn.sock_ref();
    let info = ConnectInfo {
        id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        local: sock.local_addr().ok().and_then(|a| a.as_socket()),
        peer: sock.peer_addr().ok().and_then(|a| a.as_socket()),
        multipath,
    };
    Ok((conn, Some(info)))
}
