//! Data pump for Relaycat
//!
//! Moves bytes between one network connection and the local input/output
//! streams. Each direction closes independently: network EOF stops reading
//! the network but keeps forwarding input, input EOF half-closes the
//! connection but keeps reading the network.

pub mod observer;
pub mod probe;
pub mod telnet;

use crate::config::{Config, LineEnding};
use crate::error::Result;
use crate::helper::maybe_timeout;
use crate::transport::Connection;
use observer::{EventSink, PumpEvent};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tracing::debug;

/// Streams whose read half can be shut down on its own
pub trait HalfClose {
    /// Stop receiving; writing stays possible
    fn shutdown_read(&self) -> io::Result<()>;
}

impl HalfClose for Connection {
    fn shutdown_read(&self) -> io::Result<()> {
        Connection::shutdown_read(self)
    }
}

impl HalfClose for DuplexStream {
    fn shutdown_read(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Pump settings taken from the connection parameters
#[derive(Debug, Clone)]
pub struct PumpOptions {
    /// Bytes read per side per iteration
    pub chunk_size: usize,
    /// Idle limit for each wait; `None` waits forever
    pub timeout: Option<Duration>,
    /// Delay before each wait
    pub interval: Option<Duration>,
    /// Answer TELNET negotiations
    pub telnet: bool,
    /// Line ending applied to local input
    pub line_ending: LineEnding,
    /// Never read local input
    pub no_input: bool,
}

impl PumpOptions {
    /// Build options from the relay configuration
    pub fn from_config(config: &Config) -> Self {
        PumpOptions {
            chunk_size: config.chunk_size(),
            timeout: config.timeout,
            interval: config.interval,
            telnet: config.telnet,
            line_ending: config.line_ending,
            no_input: config.no_input,
        }
    }
}

impl Default for PumpOptions {
    fn default() -> Self {
        PumpOptions::from_config(&Config::default())
    }
}

/// Why the pump returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// Both directions reached end of stream
    BothClosed,
    /// Nothing was ready within the timeout
    TimedOut,
}

enum Ready {
    Net(io::Result<usize>),
    Input(io::Result<usize>),
    Idle,
}

async fn read_input<I>(input: Option<&mut I>, buf: &mut [u8]) -> io::Result<usize>
where
    I: AsyncRead + Unpin,
{
    match input {
        Some(input) => input.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Write a chunk of local input, translating a trailing `\n` to `\r\n`
async fn write_input<N>(net: &mut N, chunk: &[u8], line_ending: LineEnding) -> io::Result<()>
where
    N: AsyncWrite + Unpin,
{
    match (line_ending, chunk.split_last()) {
        (LineEnding::Crlf, Some((b'\n', body))) => {
            net.write_all(body).await?;
            net.write_all(b"\r\n").await?;
        }
        _ => net.write_all(chunk).await?,
    }
    net.flush().await
}

/// Relay between `net` and the local streams until both directions close
///
/// Passing `None` for `input` (or setting `no_input`) leaves the
/// input-to-network direction closed from the start.
pub async fn pump<N, I, O>(
    net: &mut N,
    mut input: Option<&mut I>,
    output: &mut O,
    opts: &PumpOptions,
    events: &EventSink,
) -> Result<PumpExit>
where
    N: AsyncRead + AsyncWrite + HalfClose + Unpin,
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let chunk = opts.chunk_size.max(1);
    let mut net_buf = vec![0u8; chunk];
    let mut input_buf = vec![0u8; chunk];
    let mut net_open = true;
    let mut input_open = !opts.no_input && input.is_some();

    let result: Result<PumpExit> = loop {
        if !net_open && !input_open {
            break Ok(PumpExit::BothClosed);
        }
        if let Some(interval) = opts.interval {
            tokio::time::sleep(interval).await;
        }

        let waited = maybe_timeout(opts.timeout, async {
            tokio::select! {
                r = net.read(&mut net_buf), if net_open => Ready::Net(r),
                r = read_input(input.as_deref_mut(), &mut input_buf), if input_open => Ready::Input(r),
                else => Ready::Idle,
            }
        })
        .await;

        let Some(ready) = waited else {
            debug!("No activity within timeout");
            events.emit(PumpEvent::TimedOut);
            break Ok(PumpExit::TimedOut);
        };

        match ready {
            Ready::Net(Ok(0)) => {
                debug!("Network peer closed its write side");
                if let Err(e) = net.shutdown_read() {
                    debug!("shutdown of read half failed: {}", e);
                }
                net_open = false;
                events.emit(PumpEvent::ReadClosed);
            }
            Ready::Net(Ok(n)) => {
                let data = &net_buf[..n];
                if opts.telnet {
                    let replies = telnet::negotiate(data);
                    if !replies.is_empty() {
                        if let Err(e) = net.write_all(&replies).await {
                            tracing::warn!("Write Error! {}", e);
                        }
                        events.emit(PumpEvent::TelnetRefused(replies.len()));
                    }
                }
                if let Err(e) = async {
                    output.write_all(data).await?;
                    output.flush().await
                }
                .await
                {
                    break Err(e.into());
                }
                events.emit(PumpEvent::Received(n));
            }
            Ready::Input(Ok(0)) => {
                debug!("Local input reached end of stream");
                if let Err(e) = net.shutdown().await {
                    debug!("shutdown of write half failed: {}", e);
                }
                input_open = false;
                events.emit(PumpEvent::WriteClosed);
            }
            Ready::Input(Ok(n)) => {
                if let Err(e) = write_input(net, &input_buf[..n], opts.line_ending).await {
                    break Err(e.into());
                }
                events.emit(PumpEvent::Sent(n));
            }
            Ready::Net(Err(e)) | Ready::Input(Err(e)) => break Err(e.into()),
            Ready::Idle => break Ok(PumpExit::BothClosed),
        }
    };

    match &result {
        Ok(exit) => debug!("Pump finished: {:?}", exit),
        Err(e) => events.emit(PumpEvent::Failed(e.to_string())),
    }
    events.emit(PumpEvent::Disconnected);
    result
}
