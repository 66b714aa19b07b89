//! Session driver for Relaycat
//!
//! Dispatches on the configured mode: walks the port list for outbound
//! connections (optionally through a proxy, optionally probing only) or
//! serves inbound peers one at a time.

mod inbound;
mod outbound;

use crate::config::{Config, Mode};
use crate::error::Result;
use crate::relay::observer::{EventSink, Observer, PumpEvent};
use crate::relay::{self, PumpExit, PumpOptions};
use crate::transport::{Connection, SocketTuner};
use tokio::io::{AsyncRead, AsyncWrite, Stdin, Stdout};

pub use inbound::run_listen;
pub use outbound::run_connect;

/// Local side of the relay
#[derive(Debug)]
pub struct LocalIo<I, O> {
    /// Source of bytes sent to the network; `None` never sends
    pub input: Option<I>,
    /// Sink for bytes received from the network
    pub output: O,
}

impl<I, O> LocalIo<I, O> {
    /// Create local streams from explicit handles
    pub fn new(input: Option<I>, output: O) -> Self {
        LocalIo { input, output }
    }
}

impl LocalIo<Stdin, Stdout> {
    /// Process standard input and output
    pub fn stdio() -> Self {
        LocalIo::new(Some(tokio::io::stdin()), tokio::io::stdout())
    }
}

/// Outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Connections attempted (ports tried or peers awaited)
    pub attempted: usize,
    /// Connections that succeeded
    pub succeeded: usize,
}

impl RunSummary {
    /// Whether the run counts as a success for the exit status
    pub fn success(&self) -> bool {
        self.succeeded > 0
    }
}

/// Run the relay described by `config`
pub async fn run<I, O>(
    config: &Config,
    io: &mut LocalIo<I, O>,
    tuner: &dyn SocketTuner,
) -> Result<RunSummary>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    config.validate()?;
    match config.mode {
        Mode::Listen => run_listen(config, io, tuner).await,
        Mode::Connect => run_connect(config, io, tuner).await,
    }
}

/// Pump one connection, with the event observer when requested
async fn serve<I, O>(
    conn: &mut Connection,
    config: &Config,
    io: &mut LocalIo<I, O>,
) -> Result<PumpExit>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let opts = PumpOptions::from_config(config);
    let input = io.input.as_mut();

    if !config.debug_events {
        return relay::pump(conn, input, &mut io.output, &opts, &EventSink::disabled()).await;
    }

    let (observer, sink) = Observer::spawn();
    sink.emit(PumpEvent::Connected {
        peer: conn.peer_label(),
    });
    let result = relay::pump(conn, input, &mut io.output, &opts, &sink).await;
    observer.join(sink).await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SocketOpts;

    #[test]
    fn test_summary_success() {
        assert!(!RunSummary::default().success());
        let summary = RunSummary {
            attempted: 3,
            succeeded: 1,
        };
        assert!(summary.success());
    }

    #[tokio::test]
    async fn test_run_validates_first() {
        let config = Config {
            mode: Mode::Listen,
            port: Some("1-2".to_string()),
            ..Default::default()
        };
        let mut io = LocalIo::new(None::<&[u8]>, Vec::new());
        let result = run(&config, &mut io, &SocketOpts::default()).await;
        assert!(matches!(result, Err(crate::error::RelayError::Config(_))));
    }
}
