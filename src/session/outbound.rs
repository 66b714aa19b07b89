//! Outbound sessions: port list walk, proxying and zero-I/O probing

use super::{serve, LocalIo, RunSummary};
use crate::config::{Config, Family};
use crate::error::{ProxyError, Result};
use crate::helper::maybe_timeout;
use crate::proxy;
use crate::relay::probe;
use crate::transport::{connect_target, Connected, PortList, SocketTuner};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Establish a connection to `host`:`port`, through the proxy if one is set
///
/// The proxy handshake is bounded by the configured timeout.
async fn establish(
    config: &Config,
    host: &str,
    port: &str,
    tuner: &dyn SocketTuner,
) -> Result<Connected> {
    let Some(proxy_config) = &config.proxy else {
        return connect_target(config, host, port, tuner).await;
    };

    let proxy_port = proxy_config.port_or_default();
    let mut connected = connect_target(config, &proxy_config.host, &proxy_port, tuner).await?;
    let handshake = proxy::negotiate(&mut connected.conn, proxy_config, host, port, config.numeric);
    match maybe_timeout(config.timeout, handshake).await {
        Some(result) => result?,
        None => {
            return Err(ProxyError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "proxy handshake timed out",
            ))
            .into())
        }
    }
    Ok(connected)
}

/// Connect to each port in turn
///
/// Unreachable ports are skipped; any other failure ends the run.
pub async fn run_connect<I, O>(
    config: &Config,
    io: &mut LocalIo<I, O>,
    tuner: &dyn SocketTuner,
) -> Result<RunSummary>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let host = config.host.as_deref().unwrap_or_default();
    let mut summary = RunSummary::default();

    if config.family == Family::Unix {
        summary.attempted = 1;
        let mut connected = match connect_target(config, host, "", tuner).await {
            Ok(connected) => connected,
            Err(e) if e.is_recoverable() => {
                if config.verbose {
                    warn!("{}", e);
                }
                return Ok(summary);
            }
            Err(e) => return Err(e),
        };
        summary.succeeded = 1;
        if !config.zero_io {
            serve(&mut connected.conn, config, io).await?;
        }
        return Ok(summary);
    }

    let ports = PortList::build(config.port.as_deref().unwrap_or_default(), config.random_ports)?;
    let proto = config.proto_name();

    for port in ports.iter() {
        summary.attempted += 1;

        let mut connected = match establish(config, host, port, tuner).await {
            Ok(connected) => connected,
            Err(e) if e.is_recoverable() => {
                debug!("{}", e);
                continue;
            }
            Err(e) => return Err(e),
        };

        if config.verbose || config.zero_io {
            if !probe::probe(&mut connected.conn, config.socket_type).await {
                debug!("{} port {} ({}) did not answer the probe", host, port, proto);
                continue;
            }
            info!("Connection to {} port {} [{}/*] succeeded!", host, port, proto);
        }
        summary.succeeded += 1;

        if !config.zero_io {
            serve(&mut connected.conn, config, io).await?;
        }
    }

    Ok(summary)
}
