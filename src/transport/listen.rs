//! Inbound listeners
//!
//! A stream listener is handed back after each accept. A datagram
//! listener is consumed by its first peer: the socket is connected to the
//! sender and becomes the connection.

use super::{Connection, ConnectionTarget, SocketTuner, TunePhase};
use crate::config::{Config, Family, SocketType};
use crate::error::{RelayError, Result};
use crate::helper::LISTEN_BACKLOG;
use socket2::{Domain, SockRef, Socket, Type};
use std::net::SocketAddr;
use tokio::net::{TcpListener, UdpSocket, UnixListener};
use tracing::debug;

/// A bound, listening endpoint
#[derive(Debug)]
pub enum Listener {
    /// TCP listener
    Tcp(TcpListener),
    /// Unix-domain stream listener
    Unix(UnixListener),
    /// Bound but unconnected UDP socket
    Udp(UdpSocket),
}

impl Listener {
    /// Printable local address
    pub fn local_label(&self) -> String {
        let local = match self {
            Listener::Tcp(l) => l.local_addr().map(|a| a.to_string()),
            Listener::Udp(s) => s.local_addr().map(|a| a.to_string()),
            Listener::Unix(l) => l.local_addr().map(|a| match a.as_pathname() {
                Some(path) => path.display().to_string(),
                None => "unnamed".to_string(),
            }),
        };
        local.unwrap_or_else(|_| "unknown".to_string())
    }

    /// Local internet address, when bound to one
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Listener::Tcp(l) => l.local_addr().ok(),
            Listener::Udp(s) => s.local_addr().ok(),
            Listener::Unix(_) => None,
        }
    }
}

/// Bind the listening endpoint described by `config`
pub async fn bind_listener(config: &Config, tuner: &dyn SocketTuner) -> Result<Listener> {
    if config.family == Family::Unix {
        let path = config.host.as_deref().unwrap_or_default();
        let listener = UnixListener::bind(path).map_err(|e| RelayError::Bind {
            addr: path.to_string(),
            source: e,
        })?;
        tuner.apply(SockRef::from(&listener), Family::Unix, TunePhase::After)?;
        debug!("Listening on {}", path);
        return Ok(Listener::Unix(listener));
    }

    let target = ConnectionTarget::new(
        config.family,
        config.host.as_deref(),
        config.port.as_deref(),
        config.socket_type,
    );
    let candidates = target.resolve(config.numeric, true).await?;

    let mut last_error = None;
    for candidate in &candidates {
        let Some(addr) = candidate.socket_addr() else {
            continue;
        };
        match bind_one(config, addr, candidate.family(), tuner) {
            Ok(listener) => {
                debug!("Listening on {}", listener.local_label());
                return Ok(listener);
            }
            Err(e) => {
                debug!("bind on {} failed: {}", addr, e);
                last_error = Some((addr, e));
            }
        }
    }

    Err(match last_error {
        Some((addr, source)) => RelayError::Bind {
            addr: addr.to_string(),
            source,
        },
        None => RelayError::Resolve {
            host: config.host.clone().unwrap_or_else(|| "*".to_string()),
            reason: "no address to bind".to_string(),
        },
    })
}

fn bind_one(
    config: &Config,
    addr: SocketAddr,
    family: Family,
    tuner: &dyn SocketTuner,
) -> std::io::Result<Listener> {
    let ty = match config.socket_type {
        SocketType::Stream => Type::STREAM,
        SocketType::Datagram => Type::DGRAM,
    };
    let socket = Socket::new(Domain::for_address(addr), ty, None)?;
    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    let phase = if config.options_after_connect {
        TunePhase::After
    } else {
        TunePhase::Before
    };
    if phase == TunePhase::Before {
        tuner.apply(SockRef::from(&socket), family, phase)?;
    }
    socket.bind(&addr.into())?;
    if phase == TunePhase::After {
        tuner.apply(SockRef::from(&socket), family, phase)?;
    }

    match config.socket_type {
        SocketType::Stream => {
            socket.listen(LISTEN_BACKLOG)?;
            Ok(Listener::Tcp(TcpListener::from_std(socket.into())?))
        }
        SocketType::Datagram => Ok(Listener::Udp(UdpSocket::from_std(socket.into())?)),
    }
}

/// Wait for one peer
///
/// Returns the connection and the listener to reuse, if it survives.
pub async fn accept_one(listener: Listener, peek_size: usize) -> Result<(Connection, Option<Listener>)> {
    match listener {
        Listener::Tcp(l) => {
            let (stream, peer) = l.accept().await?;
            debug!("Accepted {}", peer);
            Ok((Connection::Tcp(stream), Some(Listener::Tcp(l))))
        }
        Listener::Unix(l) => {
            let (stream, _) = l.accept().await?;
            debug!("Accepted unix peer");
            Ok((Connection::Unix(stream), Some(Listener::Unix(l))))
        }
        Listener::Udp(socket) => {
            let mut buf = vec![0u8; peek_size.max(1)];
            let (_, peer) = socket.peek_from(&mut buf).await?;
            socket.connect(peer).await?;
            debug!("Datagram peer {}", peer);
            Ok((Connection::Udp(socket), None))
        }
    }
}
