//! Inbound sessions: serve one peer at a time

use super::{serve, LocalIo, RunSummary};
use crate::config::{Config, Family};
use crate::error::Result;
use crate::transport::{accept_one, bind_listener, Listener, SocketTuner};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Accept and relay peers until the first one finishes, or forever with
/// keep-listening
///
/// A Unix listener is bound once and reused. Internet listeners are bound
/// afresh for every peer.
pub async fn run_listen<I, O>(
    config: &Config,
    io: &mut LocalIo<I, O>,
    tuner: &dyn SocketTuner,
) -> Result<RunSummary>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut summary = RunSummary::default();
    let mut kept: Option<Listener> = None;

    loop {
        let listener = match kept.take() {
            Some(listener) => listener,
            None => bind_listener(config, tuner).await?,
        };
        if config.verbose {
            info!("Listening on {}", listener.local_label());
        }

        summary.attempted += 1;
        let (mut conn, survivor) = accept_one(listener, config.chunk_size()).await?;
        if config.verbose {
            info!("Connection received on {}", conn.peer_label());
        }
        summary.succeeded += 1;

        let served = serve(&mut conn, config, io).await;
        drop(conn);

        // Internet listeners stay bound while the peer is served
        if config.family == Family::Unix {
            kept = survivor;
        } else {
            drop(survivor);
        }

        match served {
            Ok(exit) => debug!("Peer finished: {:?}", exit),
            Err(e) if config.keep_listening => warn!("Connection ended with error: {}", e),
            Err(e) => return Err(e),
        }

        if !config.keep_listening {
            return Ok(summary);
        }
    }
}
